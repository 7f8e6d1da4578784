use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use log::info;
use serde::Serialize;
use timelock_p2sh::config::{FeeApiConfig, RpcConfig, DEFAULT_FEE_API_URL};
use timelock_p2sh::fee_api::HttpFeeRateSource;
use timelock_p2sh::rpc::{parse_utxo, BroadcastSink, NodeClient, StaticUtxoSource, UtxoSource};
use timelock_p2sh::workflow::{self, GenerateReport, SpendReport, SpendRequest};
use timelock_p2sh::{FeePriority, FeeRate, FeeRateSource, FixedFeeRate, KeySource, Network};

#[derive(Parser, Debug)]
#[command(name = "timelock-p2sh", version, about = "Create and spend absolute-timelock P2SH addresses")]
struct Cli {
    /// mainnet, testnet or regtest
    #[arg(long, env = "NETWORK", default_value = "regtest", global = true)]
    network: Network,

    /// Print the result as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the redeem script and P2SH address for a key and lock time
    Generate(GenerateArgs),
    /// Spend every UTXO at a timelocked P2SH address to a P2PKH address
    Spend(SpendArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Hex-encoded public key
    #[arg(long, conflicts_with = "privkey", required_unless_present = "privkey")]
    pubkey: Option<String>,

    /// WIF private key
    #[arg(long)]
    privkey: Option<String>,

    /// Block height (< 500000000) or UNIX timestamp
    #[arg(long, allow_negative_numbers = true)]
    locktime: i64,
}

#[derive(Args, Debug)]
struct SpendArgs {
    /// WIF private key matching the redeem script
    #[arg(long)]
    privkey: String,

    /// Lock time the address was generated with
    #[arg(long, allow_negative_numbers = true)]
    locktime: i64,

    /// Timelocked P2SH address holding the funds
    #[arg(long = "p2sh-addr")]
    p2sh_addr: String,

    /// P2PKH address receiving the funds
    #[arg(long = "p2pkh-addr")]
    p2pkh_addr: String,

    #[arg(long, env = "RPCHOST")]
    rpc_host: Option<String>,

    /// Defaults to the network's standard RPC port
    #[arg(long, env = "RPCPORT")]
    rpc_port: Option<u16>,

    #[arg(long, env = "RPCUSER")]
    rpc_user: Option<String>,

    #[arg(long, env = "RPCPASSWORD", hide_env_values = true)]
    rpc_password: Option<String>,

    /// Fee rate in sat/kB; skips the fee API
    #[arg(long)]
    fee_rate: Option<u64>,

    #[arg(long, env = "FEE_API_URL", default_value = DEFAULT_FEE_API_URL)]
    fee_api_url: String,

    #[arg(long, env = "TATUM_API_KEY", hide_env_values = true)]
    fee_api_key: Option<String>,

    /// slow, medium or fast
    #[arg(long, env = "FEE_SPEED", default_value = "fast")]
    fee_speed: FeePriority,

    /// Run the mempool acceptance test but do not broadcast
    #[arg(long)]
    no_broadcast: bool,

    /// Sign only: no node is contacted, UTXOs come from --utxo
    #[arg(long, requires = "utxo")]
    offline: bool,

    /// Funding output as txid:vout:sats (repeatable, offline mode)
    #[arg(long, requires = "offline")]
    utxo: Vec<String>,
}

fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => {
            let report = run_generate(args, cli.network)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_generate(&report);
            }
        }
        Command::Spend(args) => {
            let report = run_spend(args, cli.network)?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_spend(&report);
            }
        }
    }
    Ok(())
}

fn run_generate(args: GenerateArgs, network: Network) -> Result<GenerateReport> {
    let source = match (args.pubkey, args.privkey) {
        (Some(pubkey), _) => KeySource::PublicKey(pubkey),
        (None, Some(privkey)) => KeySource::PrivateKey(privkey),
        (None, None) => anyhow::bail!("one of --pubkey or --privkey is required"),
    };
    Ok(workflow::generate(&source, args.locktime, network)?)
}

fn run_spend(args: SpendArgs, network: Network) -> Result<SpendReport> {
    let request = SpendRequest {
        private_key_wif: args.privkey,
        lock_time: args.locktime,
        p2sh_address: args.p2sh_addr,
        p2pkh_address: args.p2pkh_addr,
        network,
        fee_priority: args.fee_speed,
        broadcast: !args.no_broadcast,
    };

    let fee_source: Box<dyn FeeRateSource> = match args.fee_rate {
        Some(rate) => Box::new(FixedFeeRate(FeeRate::from_sat_per_kb(rate))),
        None => Box::new(HttpFeeRateSource::new(FeeApiConfig {
            url: args.fee_api_url,
            api_key: args.fee_api_key,
        })?),
    };

    if args.offline {
        let utxos = args
            .utxo
            .iter()
            .map(|value| parse_utxo(value))
            .collect::<timelock_p2sh::Result<Vec<_>>>()
            .context("invalid --utxo value")?;
        info!("offline mode: signing without contacting a node");
        let source = StaticUtxoSource::new(utxos);
        return Ok(workflow::spend(&request, &source, fee_source.as_ref(), None)?);
    }

    let rpc_config = RpcConfig::for_network(network)
        .with_host(args.rpc_host)
        .with_port(args.rpc_port)
        .with_credentials(args.rpc_user, args.rpc_password);
    let node = NodeClient::new(&rpc_config).with_context(|| format!("connecting to {}", rpc_config.url()))?;
    let utxo_source: &dyn UtxoSource = &node;
    let sink: &dyn BroadcastSink = &node;
    Ok(workflow::spend(&request, utxo_source, fee_source.as_ref(), Some(sink))?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_generate(report: &GenerateReport) {
    println!("Network:            {}", report.network);
    println!("Lock time:          {}", report.lock_time_description);
    println!("Public key:         {}", report.public_key);
    println!("Redeem script:      {}", report.redeem_script);
    println!("Redeem script hex:  {}", report.redeem_script_hex);
    println!("P2SH address:       {}", report.p2sh_address);
}

fn print_spend(report: &SpendReport) {
    println!("From:               {}", report.p2sh_address);
    println!("To:                 {}", report.recipient);
    println!("Lock time:          {}", report.lock_time);
    println!("UTXOs:              {}", report.utxo_count);
    println!("Total input:        {} sat", report.total_input);
    println!("Fee:                {} sat", report.fee);
    println!("Amount sent:        {} sat", report.amount_to_send);
    println!("Unsigned tx:        {}", report.unsigned_hex);
    println!("Signed tx:          {}", report.signed_hex);
    println!("Txid:               {}", report.txid);
    println!("Status:             {}", report.status);
}
