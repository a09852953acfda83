use std::env;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use sdk::{
    auction_subscriber::AuctionSubscriber,
    drift_client_config::ClientOpts,
    slot_subscriber::SlotSubscriber,
    utils::{get_ws_url, load_keypair_multi_format},
    DriftClient, RpcAccountProvider, Wallet,
};
use solana_sdk::commitment_config::CommitmentConfig;

use jit_proxy::{
    jitter::{JitParams, Jitter},
    types::PriceType,
    JitProxyClient,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire on every slot of the auction window
    Shotgun(StrategyArgs),

    /// Wait for the predicted crossing slot, then fire a short burst
    Sniper(StrategyArgs),
}

#[derive(Args)]
struct StrategyArgs {
    /// Perp market indexes to quote
    #[arg(long, value_delimiter = ',', default_value = "0")]
    perp_markets: Vec<u16>,

    /// Spot market indexes to quote
    #[arg(long, value_delimiter = ',')]
    spot_markets: Vec<u16>,

    /// Maker bid, an offset against the oracle unless --limit-prices
    #[arg(long, default_value_t = -1_000_000)]
    bid: i64,

    /// Maker ask, an offset against the oracle unless --limit-prices
    #[arg(long, default_value_t = 1_010_000)]
    ask: i64,

    /// Most negative inventory the maker may reach
    #[arg(long, default_value_t = 0)]
    min_position: i64,

    /// Largest inventory the maker may reach
    #[arg(long, default_value_t = 2)]
    max_position: i64,

    /// Treat bid/ask as absolute prices instead of oracle offsets
    #[arg(long)]
    limit_prices: bool,

    /// Sub account the maker order posts from
    #[arg(long)]
    sub_account_id: Option<u16>,
}

impl StrategyArgs {
    fn jit_params(&self) -> JitParams {
        let price_type = if self.limit_prices {
            PriceType::Limit
        } else {
            PriceType::Oracle
        };
        JitParams::new(
            self.bid,
            self.ask,
            self.min_position,
            self.max_position,
            price_type,
            self.sub_account_id,
        )
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenv().ok();
    env_logger::init();

    let endpoint = env::var("RPC_URL").expect("RPC_URL must be set");
    let private_key = env::var("PRIVATE_KEY").expect("PRIVATE_KEY must be set");
    let wallet = Wallet::new(load_keypair_multi_format(&private_key).expect("valid keypair"));

    let args = match &cli.command {
        Commands::Shotgun(args) | Commands::Sniper(args) => args,
    };
    let sub_account_id = args.sub_account_id.unwrap_or(0);

    let provider = RpcAccountProvider::with_commitment(&endpoint, CommitmentConfig::confirmed());
    let mut drift_client = DriftClient::new(
        provider,
        wallet,
        ClientOpts::new(sub_account_id, Some(vec![sub_account_id])),
    )
    .expect("drift client");
    drift_client
        .add_user(sub_account_id)
        .await
        .expect("user account subscription");

    let ws_url = get_ws_url(&endpoint).expect("valid url");
    let auction_subscriber = AuctionSubscriber::new(&ws_url, CommitmentConfig::confirmed());
    let jit_proxy_client = JitProxyClient::new(drift_client.clone(), None);

    let jitter = match &cli.command {
        Commands::Shotgun(_) => {
            log::info!("starting shotgun jitter");
            Jitter::new_with_shotgun(drift_client, jit_proxy_client, auction_subscriber)
        }
        Commands::Sniper(_) => {
            log::info!("starting sniper jitter");
            let slot_subscriber = SlotSubscriber::new(&ws_url);
            Jitter::new_with_sniper(
                drift_client,
                jit_proxy_client,
                auction_subscriber,
                slot_subscriber,
            )
        }
    };

    let jit_params = args.jit_params();
    for market_index in &args.perp_markets {
        jitter.update_perp_params(*market_index, jit_params);
        log::info!("quoting perp market {market_index}: {jit_params:?}");
    }
    for market_index in &args.spot_markets {
        jitter.update_spot_params(*market_index, jit_params);
        log::info!("quoting spot market {market_index}: {jit_params:?}");
    }

    jitter.subscribe().await.expect("jitter subscription");
    log::info!("subscribed, racing auctions");

    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
    }
}
