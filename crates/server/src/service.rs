//! The `tessera.Shard` gRPC service.
//!
//! Written in the shape `tonic-build` generates, with [`JsonCodec`] in place of protobuf:
//! a [`Shard`] trait for the handler, a [`ShardServiceServer`] tower service that routes by
//! method path, and a [`ShardClient`] over a tonic channel.

use crate::codec::JsonCodec;
use crate::messages::{RunQueryRequest, RunQueryResponse, TableSchemaRequest, TableSchemaResponse};
use crate::status::to_status;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tessera_error::TesseraError;
use tessera_runtime::ShardEngine;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tracing::debug;

pub const SERVICE_NAME: &str = "tessera.Shard";
pub const RUN_QUERY_PATH: &str = "/tessera.Shard/RunQuery";
pub const GET_TABLE_SCHEMA_PATH: &str = "/tessera.Shard/GetTableSchema";

#[async_trait]
pub trait Shard: Send + Sync + 'static {
    async fn run_query(
        &self,
        request: Request<RunQueryRequest>,
    ) -> Result<Response<RunQueryResponse>, Status>;

    async fn get_table_schema(
        &self,
        request: Request<TableSchemaRequest>,
    ) -> Result<Response<TableSchemaResponse>, Status>;
}

/// [`Shard`] backed by a [`ShardEngine`].
pub struct ShardHandler {
    engine: Arc<ShardEngine>,
}

impl ShardHandler {
    pub fn new(engine: Arc<ShardEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Shard for ShardHandler {
    async fn run_query(
        &self,
        request: Request<RunQueryRequest>,
    ) -> Result<Response<RunQueryResponse>, Status> {
        let RunQueryRequest {
            template,
            config,
            override_conditions,
        } = request.into_inner();
        debug!(
            target: "router",
            template_id = %template.id,
            config_id = %config.id,
            overrides = override_conditions.len(),
            "RunQuery received"
        );
        let output = self
            .engine
            .run_query(&template, &config, override_conditions)
            .await
            .map_err(|e| to_status(&e))?;
        let json_result = serde_json::to_string(&output.to_json())
            .map_err(|e| to_status(&TesseraError::from(e)))?;
        Ok(Response::new(RunQueryResponse { json_result }))
    }

    async fn get_table_schema(
        &self,
        request: Request<TableSchemaRequest>,
    ) -> Result<Response<TableSchemaResponse>, Status> {
        let TableSchemaRequest {
            config_id,
            table_name,
        } = request.into_inner();
        let columns = self
            .engine
            .table_schema(&config_id, &table_name)
            .await
            .map_err(|e| to_status(&e))?;
        Ok(Response::new(TableSchemaResponse { columns }))
    }
}

#[derive(Debug)]
pub struct ShardServiceServer<T> {
    inner: Arc<T>,
}

impl<T> ShardServiceServer<T> {
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

impl<T> Clone for ShardServiceServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> tonic::server::NamedService for ShardServiceServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}

struct RunQuerySvc<T: Shard>(Arc<T>);

impl<T: Shard> tonic::server::UnaryService<RunQueryRequest> for RunQuerySvc<T> {
    type Response = RunQueryResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<RunQueryRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.run_query(request).await })
    }
}

struct GetTableSchemaSvc<T: Shard>(Arc<T>);

impl<T: Shard> tonic::server::UnaryService<TableSchemaRequest> for GetTableSchemaSvc<T> {
    type Response = TableSchemaResponse;
    type Future = BoxFuture<Response<Self::Response>, Status>;

    fn call(&mut self, request: Request<TableSchemaRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.get_table_schema(request).await })
    }
}

impl<T, B> Service<http::Request<B>> for ShardServiceServer<T>
where
    T: Shard,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let inner = self.inner.clone();
        match req.uri().path() {
            RUN_QUERY_PATH => Box::pin(async move {
                let codec = JsonCodec::<RunQueryResponse, RunQueryRequest>::default();
                let mut grpc = tonic::server::Grpc::new(codec);
                Ok(grpc.unary(RunQuerySvc(inner), req).await)
            }),
            GET_TABLE_SCHEMA_PATH => Box::pin(async move {
                let codec = JsonCodec::<TableSchemaResponse, TableSchemaRequest>::default();
                let mut grpc = tonic::server::Grpc::new(codec);
                Ok(grpc.unary(GetTableSchemaSvc(inner), req).await)
            }),
            _ => Box::pin(async move {
                let mut response = http::Response::new(empty_body());
                let headers = response.headers_mut();
                headers.insert(
                    http::HeaderName::from_static("grpc-status"),
                    http::HeaderValue::from(tonic::Code::Unimplemented as i32),
                );
                headers.insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/grpc"),
                );
                Ok(response)
            }),
        }
    }
}

/// Client half of `tessera.Shard`. Cheap to clone; clones share the channel.
#[derive(Debug, Clone)]
pub struct ShardClient {
    inner: tonic::client::Grpc<Channel>,
}

impl ShardClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn run_query(&mut self, request: RunQueryRequest) -> Result<RunQueryResponse, Status> {
        self.unary(request, RUN_QUERY_PATH).await
    }

    pub async fn get_table_schema(
        &mut self,
        request: TableSchemaRequest,
    ) -> Result<TableSchemaResponse, Status> {
        self.unary(request, GET_TABLE_SCHEMA_PATH).await
    }

    async fn unary<Req, Resp>(&mut self, message: Req, path: &'static str) -> Result<Resp, Status>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + Sync + 'static,
    {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("Shard channel not ready: {}", e)))?;
        let codec = JsonCodec::<Req, Resp>::default();
        let response = self
            .inner
            .unary(Request::new(message), PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}
