pub mod jit_proxy_client;
pub mod jitter;
pub mod types;

pub use jit_proxy_client::{jit_proxy_program, JitProxyClient};
pub use jitter::{order_signature, JitParams, Jitter, Shotgun, Sniper, UserFilter};
pub use types::{JitError, JitResult};
