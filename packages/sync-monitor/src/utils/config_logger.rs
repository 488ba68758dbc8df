use tracing::info;

pub fn log_config(config: &crate::config::Config) {
    info!(
        "Config settings: node_rpc_url={}, poll_interval_ms={}, stale_block_threshold_secs={}, node_check_interval_ms={}",
        config.node_rpc_url, config.poll_interval_ms, config.stale_block_threshold_secs, config.node_check_interval_ms
    );

    if config.uses_websocket() {
        info!("Connecting to the node over WebSocket");
    }
}
