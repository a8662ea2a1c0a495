//! WASM-compatibility marker traits.
//!
//! Native targets require `Send`/`Sync` on futures and trait objects that
//! cross thread boundaries inside `tokio`. `wasm32` targets are single
//! threaded and most WASM futures are not `Send`, so the bound has to
//! disappear there instead of being worked around with `unsafe impl`.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    /// `Send` on native targets, unconditional on `wasm32`.
    pub trait WasmCompatSend: Send {}
    impl<T: Send> WasmCompatSend for T {}

    /// `Sync` on native targets, unconditional on `wasm32`.
    pub trait WasmCompatSync: Sync {}
    impl<T: Sync> WasmCompatSync for T {}
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    /// `Send` on native targets, unconditional on `wasm32`.
    pub trait WasmCompatSend {}
    impl<T> WasmCompatSend for T {}

    /// `Sync` on native targets, unconditional on `wasm32`.
    pub trait WasmCompatSync {}
    impl<T> WasmCompatSync for T {}
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::{WasmCompatSend, WasmCompatSync};
#[cfg(target_arch = "wasm32")]
pub use wasm::{WasmCompatSend, WasmCompatSync};

/// A boxed future that is `Send` on native targets and not on `wasm32`.
#[cfg(not(target_arch = "wasm32"))]
pub type WasmBoxedFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
#[cfg(target_arch = "wasm32")]
pub type WasmBoxedFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + 'a>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: WasmCompatSend>() {}
    fn assert_sync<T: WasmCompatSync>() {}

    #[test]
    fn primitives_are_wasm_compat() {
        assert_send::<u32>();
        assert_sync::<u32>();
        assert_send::<String>();
    }
}
