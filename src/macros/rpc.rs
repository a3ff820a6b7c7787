//! Macro for generating typed JSON-RPC wrappers on top of `FallbackProvider::perform`.

/// Generates a typed RPC method that goes through retry and failover.
///
/// Arguments are serialized, in order, into the JSON-RPC parameter array and the raw result is
/// decoded into the return type.
///
/// ```ignore
/// fallback_rpc!(
///     /// Short description of the method.
///     fn get_balance(address: Address, block: BlockId) -> U256 = "eth_getBalance"
/// );
/// ```
#[allow(unused_macros)]
macro_rules! fallback_rpc {
    (
        $(#[$meta:meta])*
        fn $method:ident ($($arg:ident: $arg_ty:ty),*) -> $ret:ty = $rpc_method:literal
    ) => {
        $(#[$meta])*
        ///
        /// # Errors
        ///
        /// * [`Error::AllEndpointsFailed`] - if every attempted endpoint exhausted its retries.
        /// * [`Error::NoValidEndpoints`] - if no endpoint is currently valid.
        /// * [`Error::NetworkMismatch`] - if the endpoints disagree on the network.
        /// * [`Error::InvalidResponse`] - if the result cannot be decoded.
        pub async fn $method(&self $(, $arg: $arg_ty)*) -> Result<$ret, Error> {
            self.perform_as($rpc_method, serde_json::json!([$($arg),*])).await
        }
    };
}
