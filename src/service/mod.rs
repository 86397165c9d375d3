//! Supervision of, and RPC against, the local prediction/training service.

pub mod launch;
pub mod rpc;
pub mod supervisor;

pub use launch::ServiceCommand;
pub use rpc::{RpcClient, RpcTimeouts, ServiceAddress, TransportError};
pub use supervisor::{
    HealthProbe, Readiness, ReadinessPolicy, ServiceEndpoint, ServiceState, SoftStop, Supervisor,
    SupervisorError, wait_until_ready,
};
