use std::time::Duration;

use fallback_provider::FallbackProviderBuilder;

const RPC_URLS: [&str; 2] =
    ["https://ethereum-rpc.publicnode.com", "https://eth.llamarpc.com"];

#[tokio::main]
async fn main() {
    let provider = FallbackProviderBuilder::new()
        .endpoints(RPC_URLS)
        .call_timeout(Duration::from_secs(10))
        .build()
        .expect("should build provider");

    let network = provider.detect_network_identity().await.expect("endpoints should agree");
    println!("Network: {network}");

    let block_number = provider.get_block_number().await.expect("should fetch block number");
    println!("Latest block: {block_number} (served by endpoint #{})", provider.active_index());
}
