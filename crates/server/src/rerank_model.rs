//! [`RerankModel`] backed by the remote scoring service.

use async_trait::async_trait;
use data_loader::UserId;
use ml_client::{MLClientError, RerankClient};
use pipeline::{FeatureRow, RerankModel};
use sources::{RecommendError, Result};

pub struct GrpcRerankModel {
    client: RerankClient,
}

impl GrpcRerankModel {
    pub fn new(client: RerankClient) -> Self {
        Self { client }
    }

    pub fn service_address(&self) -> &str {
        self.client.service_address()
    }
}

#[async_trait]
impl RerankModel for GrpcRerankModel {
    async fn score(&self, user_id: &UserId, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        let rows = rows
            .iter()
            .map(|row| ml_client::FeatureRow {
                business_id: row.business_id.to_string(),
                features: row.features.clone(),
            })
            .collect();

        self.client
            .score(user_id.as_str(), rows)
            .await
            .map_err(upstream_error)
    }
}

fn upstream_error(e: MLClientError) -> RecommendError {
    RecommendError::UpstreamUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ml_client::rerank::reranker_server::{Reranker, RerankerServer};
    use ml_client::{ScoreRequest, ScoreResponse};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;
    use tonic::{Request, Response, Status};

    /// Scores each row by its business star column
    struct StarsReranker;

    #[tonic::async_trait]
    impl Reranker for StarsReranker {
        async fn score_candidates(
            &self,
            request: Request<ScoreRequest>,
        ) -> std::result::Result<Response<ScoreResponse>, Status> {
            let scores = request
                .into_inner()
                .rows
                .iter()
                .map(|row| f64::from(row.features[17]))
                .collect();
            Ok(Response::new(ScoreResponse { scores }))
        }
    }

    fn feature_row(business_id: &str, stars: f32) -> FeatureRow {
        let mut features = vec![0.0; 22];
        features[17] = stars;
        FeatureRow {
            user_id: UserId::from("U1"),
            business_id: data_loader::BusinessId::from(business_id),
            features,
        }
    }

    #[test]
    fn test_client_errors_are_upstream_failures() {
        let error = upstream_error(MLClientError::Timeout(Duration::from_millis(200)));
        assert!(matches!(error, RecommendError::UpstreamUnavailable(message) if message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_scores_through_service() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            Server::builder()
                .add_service(RerankerServer::new(StarsReranker))
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .unwrap();
        });

        let client = RerankClient::connect(format!("http://{}", addr)).await.unwrap();
        let model = GrpcRerankModel::new(client);

        let rows = vec![feature_row("B1", 4.5), feature_row("B2", 3.0)];
        let scores = model.score(&UserId::from("U1"), &rows).await.unwrap();
        assert_eq!(scores, vec![4.5, 3.0]);
    }

    #[tokio::test]
    async fn test_empty_batch_needs_no_service() {
        let client = RerankClient::connect_lazy("http://127.0.0.1:50051").unwrap();
        let model = GrpcRerankModel::new(client);

        let scores = model.score(&UserId::from("U1"), &[]).await.unwrap();
        assert!(scores.is_empty());
        assert_eq!(model.service_address(), "http://127.0.0.1:50051");
    }
}
