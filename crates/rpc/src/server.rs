//! The RPC server implementations.

use crate::{
    compute_l2_output_root, verify_account_proof, AdminApiServer, DriverAdminError,
    DriverRpcRequest, L2EthClient, OutputResponse, RollupNodeApiServer, OUTPUT_ROOT_VERSION_V0,
};
use alloy_primitives::B256;
use jsonrpsee::{
    core::RpcResult,
    server::{Server, ServerHandle},
    types::{ErrorCode, ErrorObject, ErrorObjectOwned},
};
use kanvas_genesis::{Predeploys, RollupConfig};
use kanvas_protocol::SyncStatus;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::{mpsc, oneshot};

/// The error code returned for unknown blocks.
const NOT_FOUND_CODE: i32 = -32001;

/// RPC server configuration.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// The listen address.
    pub listen_addr: SocketAddr,
    /// Whether the admin namespace is served.
    pub enable_admin: bool,
}

/// An error launching the RPC server.
#[derive(Debug, thiserror::Error)]
pub enum RpcServerError {
    /// The listener could not be bound.
    #[error("failed to bind rpc server: {0}")]
    Bind(String),
    /// The modules could not be merged.
    #[error("failed to register rpc module: {0}")]
    Module(String),
}

/// The `kanvas` namespace handler.
#[derive(Debug)]
pub struct RollupRpc {
    /// The rollup config served by `kanvas_rollupConfig`.
    cfg: Arc<RollupConfig>,
    /// The channel into the driver loop.
    driver_tx: mpsc::Sender<DriverRpcRequest>,
    /// The L2 eth client used for proofs.
    l2_client: Arc<dyn L2EthClient>,
    /// The version string served by `kanvas_version`.
    version: String,
}

impl RollupRpc {
    /// Creates a new handler.
    pub fn new(
        cfg: Arc<RollupConfig>,
        driver_tx: mpsc::Sender<DriverRpcRequest>,
        l2_client: Arc<dyn L2EthClient>,
        version: String,
    ) -> Self {
        Self { cfg, driver_tx, l2_client, version }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> DriverRpcRequest,
    ) -> RpcResult<T> {
        let (tx, rx) = oneshot::channel();
        self.driver_tx
            .send(make(tx))
            .await
            .map_err(|_| ErrorObject::from(ErrorCode::InternalError))?;
        rx.await.map_err(|_| ErrorObject::from(ErrorCode::InternalError))
    }
}

fn not_found(msg: String) -> ErrorObjectOwned {
    ErrorObject::owned(NOT_FOUND_CODE, msg, None::<()>)
}

#[async_trait::async_trait]
impl RollupNodeApiServer for RollupRpc {
    async fn output_at_block(&self, block_number: u64) -> RpcResult<OutputResponse> {
        let Some((block_ref, sync_status)) = self
            .request(|tx| DriverRpcRequest::BlockRefWithStatus { number: block_number, tx })
            .await?
        else {
            return Err(not_found(format!("block not found: {block_number}")));
        };

        let block_hash = block_ref.block_info.hash;
        let state_root = self
            .l2_client
            .state_root_by_hash(block_hash)
            .await
            .map_err(|e| not_found(e.to_string()))?;

        let proof = self
            .l2_client
            .get_proof(Predeploys::L2_TO_L1_MESSAGE_PASSER, block_hash)
            .await
            .map_err(|e| ErrorObject::owned(ErrorCode::InternalError.code(), e.to_string(), None::<()>))?;

        // The storage hash feeding the output root must be committed to by the
        // block's state root.
        if let Err(err) = verify_account_proof(&proof, state_root) {
            error!(
                target: "rpc",
                %state_root,
                block = block_number,
                %err,
                "Invalid withdrawal root detected"
            );
            return Err(ErrorObject::owned(
                ErrorCode::InternalError.code(),
                format!("invalid withdrawal root hash, state root was {state_root}"),
                None::<()>,
            ));
        }

        let output_root = compute_l2_output_root(
            OUTPUT_ROOT_VERSION_V0,
            state_root,
            proof.storage_hash,
            block_hash,
        );

        Ok(OutputResponse {
            version: OUTPUT_ROOT_VERSION_V0,
            output_root,
            block_ref,
            withdrawal_storage_root: proof.storage_hash,
            state_root,
            sync_status,
        })
    }

    async fn sync_status(&self) -> RpcResult<SyncStatus> {
        self.request(DriverRpcRequest::SyncStatus).await
    }

    async fn rollup_config(&self) -> RpcResult<RollupConfig> {
        Ok((*self.cfg).clone())
    }

    async fn version(&self) -> RpcResult<String> {
        Ok(self.version.clone())
    }
}

/// The `admin` namespace handler.
#[derive(Debug)]
pub struct AdminRpc {
    /// The channel into the driver loop.
    driver_tx: mpsc::Sender<DriverRpcRequest>,
}

impl AdminRpc {
    /// Creates a new handler.
    pub const fn new(driver_tx: mpsc::Sender<DriverRpcRequest>) -> Self {
        Self { driver_tx }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> DriverRpcRequest,
    ) -> RpcResult<T> {
        let (tx, rx) = oneshot::channel();
        self.driver_tx
            .send(make(tx))
            .await
            .map_err(|_| ErrorObject::from(ErrorCode::InternalError))?;
        rx.await.map_err(|_| ErrorObject::from(ErrorCode::InternalError))
    }
}

fn admin_error(err: DriverAdminError) -> ErrorObjectOwned {
    ErrorObject::owned(ErrorCode::InvalidParams.code(), err.to_string(), None::<()>)
}

#[async_trait::async_trait]
impl AdminApiServer for AdminRpc {
    async fn reset_derivation_pipeline(&self) -> RpcResult<()> {
        info!(target: "rpc", "admin_resetDerivationPipeline requested");
        self.request(DriverRpcRequest::ResetPipeline).await
    }

    async fn start_proposer(&self, block_hash: B256) -> RpcResult<()> {
        info!(target: "rpc", %block_hash, "admin_startProposer requested");
        self.request(|tx| DriverRpcRequest::StartProposer { block_hash, tx })
            .await?
            .map_err(admin_error)
    }

    async fn stop_proposer(&self) -> RpcResult<B256> {
        info!(target: "rpc", "admin_stopProposer requested");
        self.request(DriverRpcRequest::StopProposer).await?.map_err(admin_error)
    }
}

/// Launches the RPC server, merging in the admin namespace when enabled.
pub async fn launch_rpc_server(
    config: RpcConfig,
    rollup: RollupRpc,
    admin: AdminRpc,
) -> Result<ServerHandle, RpcServerError> {
    let server = Server::builder()
        .build(config.listen_addr)
        .await
        .map_err(|e| RpcServerError::Bind(e.to_string()))?;

    let mut module = rollup.into_rpc();
    if config.enable_admin {
        module.merge(admin.into_rpc()).map_err(|e| RpcServerError::Module(e.to_string()))?;
    }

    info!(target: "rpc", addr = %config.listen_addr, admin = config.enable_admin, "RPC server started");
    Ok(server.start(module))
}
