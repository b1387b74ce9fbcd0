//! filUSD engine CLI
//!
//! Command-line interface for inspecting the filUSD liquidation engine:
//! parameter display, gas compensation and ICR math, and deterministic
//! liquidation simulations.

use clap::{Args, Parser, Subcommand};
use console::{style, Term};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use filusd::core::borrower;
use filusd::core::config::EngineParams;
use filusd::liquidation::compensation::{coll_gas_compensation, composite_debt};
use filusd::liquidation::engine::LiquidationEngine;
use filusd::oracle::price_feed::PriceFeed;
use filusd::system::SystemState;
use filusd::utils::address::Address;
use filusd::utils::constants::{
    DECIMAL_PRECISION, MIN_COLL_GAS_COMP_VALUE, NOMINAL_PRICE, PERCENT_DIVISOR,
};
use filusd::utils::math::{compute_icr, compute_nominal_icr, mul_div, usd_value};

/// filUSD engine CLI - liquidation engine for the filUSD stablecoin
#[derive(Parser)]
#[command(name = "filusd")]
#[command(version = filusd::VERSION)]
#[command(about = "Inspect and simulate the filUSD liquidation engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the engine parameters
    Params,

    /// Compute the gas compensation split for a Trove's collateral
    GasComp {
        /// Collateral in FIL (decimal)
        #[arg(short, long)]
        collateral: String,

        /// FIL/USD price (decimal)
        #[arg(short, long)]
        price: String,
    },

    /// Compute a Trove's collateral ratios
    Icr {
        /// Collateral in FIL (decimal)
        #[arg(short, long)]
        collateral: String,

        /// Net debt in fUSD (decimal)
        #[arg(short, long)]
        debt: String,

        /// FIL/USD price (decimal)
        #[arg(short, long)]
        price: String,
    },

    /// Open a randomized set of Troves, drop the price, and run a batch
    /// liquidation. Identical seeds produce identical digests.
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct SimulateArgs {
    /// Number of Troves to open
    #[arg(short, long, default_value = "8")]
    troves: u32,

    /// Opening FIL/USD price (decimal)
    #[arg(long, default_value = "400")]
    price: String,

    /// Price after the crash (decimal)
    #[arg(long, default_value = "205")]
    drop_to: String,

    /// Stability pool deposit in fUSD (decimal)
    #[arg(long, default_value = "5000")]
    pool: String,

    /// Maximum Troves to liquidate in the batch
    #[arg(short, long, default_value = "10")]
    max: usize,

    /// RNG seed for the Trove set
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Emit the outcome as JSON instead of the panel
    #[arg(long)]
    json: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Params => cmd_params(term),
        Commands::GasComp { collateral, price } => cmd_gas_comp(collateral, price, term),
        Commands::Icr {
            collateral,
            debt,
            price,
        } => cmd_icr(collateral, debt, price, term),
        Commands::Simulate(args) => cmd_simulate(args, term),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_params(term: &Term) -> anyhow::Result<()> {
    let params = EngineParams::default();

    let _ = term.write_line("");
    let _ = term.write_line(&format!(
        "{}",
        style("╔════════════════════════════════════════════════════════════╗").cyan()
    ));
    let _ = term.write_line(&format!(
        "{}                  {}                    {}",
        style("║").cyan(),
        style("filUSD Engine Parameters").bold(),
        style("║").cyan()
    ));
    let _ = term.write_line(&format!(
        "{}",
        style("╠════════════════════════════════════════════════════════════╣").cyan()
    ));
    panel_row(term, "Version:", filusd::VERSION);
    panel_row(term, "Min collateral ratio:", &format_ratio(params.mcr));
    panel_row(term, "Min net debt:", &format_fusd(params.min_net_debt));
    panel_row(
        term,
        "Gas compensation (virtual):",
        &format_fusd(params.gas_compensation),
    );
    panel_row(
        term,
        "Collateral compensation:",
        &format!("1/{} of collateral", PERCENT_DIVISOR),
    );
    panel_row(
        term,
        "Compensation floor:",
        &format_usd(MIN_COLL_GAS_COMP_VALUE),
    );
    panel_row(term, "Nominal price:", &format_usd(NOMINAL_PRICE));
    let _ = term.write_line(&format!(
        "{}",
        style("╚════════════════════════════════════════════════════════════╝").cyan()
    ));
    let _ = term.write_line("");

    Ok(())
}

fn cmd_gas_comp(collateral: &str, price: &str, term: &Term) -> anyhow::Result<()> {
    let collateral = parse_fixed(collateral)?;
    let price = parse_fixed(price)?;

    let compensation = coll_gas_compensation(collateral, price)?;
    let remainder = collateral - compensation;
    let pct_slice = collateral / PERCENT_DIVISOR;

    let path = if price == 0 {
        "full collateral (zero price)"
    } else if usd_value(pct_slice, price)? >= MIN_COLL_GAS_COMP_VALUE {
        "0.5% of collateral"
    } else if compensation == collateral {
        "full collateral ($10 floor exceeds it)"
    } else {
        "$10 floor"
    };

    let _ = term.write_line(&format!(
        "{} Gas compensation for {} FIL at {}",
        style("→").cyan(),
        format_fixed(collateral),
        format_usd(price)
    ));
    let _ = term.write_line(&format!("  Path:         {}", style(path).cyan()));
    let _ = term.write_line(&format!(
        "  Compensation: {} FIL ({})",
        style(format_fixed(compensation)).yellow(),
        format_usd(usd_value(compensation, price)?)
    ));
    let _ = term.write_line(&format!(
        "  To liquidate: {} FIL",
        style(format_fixed(remainder)).green()
    ));

    Ok(())
}

fn cmd_icr(collateral: &str, debt: &str, price: &str, term: &Term) -> anyhow::Result<()> {
    let collateral = parse_fixed(collateral)?;
    let debt = parse_fixed(debt)?;
    let price = parse_fixed(price)?;
    let params = EngineParams::default();

    let composite = composite_debt(debt, params.gas_compensation)?;
    let icr = compute_icr(collateral, composite, price)?;
    let nicr = compute_nominal_icr(collateral, composite)?;

    let verdict = if icr < params.mcr {
        style("LIQUIDATABLE").red().bold()
    } else {
        style("healthy").green()
    };

    let _ = term.write_line(&format!(
        "{} {} FIL against {} net debt at {}",
        style("→").cyan(),
        format_fixed(collateral),
        format_fusd(debt),
        format_usd(price)
    ));
    let _ = term.write_line(&format!(
        "  Composite debt: {}",
        format_fusd(composite)
    ));
    let _ = term.write_line(&format!(
        "  ICR:            {} (minimum {})",
        style(format_ratio(icr)).yellow(),
        format_ratio(params.mcr)
    ));
    let _ = term.write_line(&format!("  Nominal ICR:    {}", format_ratio(nicr)));
    let _ = term.write_line(&format!("  Status:         {}", verdict));

    Ok(())
}

fn cmd_simulate(args: &SimulateArgs, term: &Term) -> anyhow::Result<()> {
    if args.troves == 0 {
        anyhow::bail!("need at least one trove to simulate");
    }
    let open_price = parse_fixed(&args.price)?;
    let drop_price = parse_fixed(&args.drop_to)?;
    let pool_deposit = parse_fixed(&args.pool)?;

    let params = EngineParams::default();
    let mut state = SystemState::new(params)?;
    let mut feed = PriceFeed::with_price(open_price)?;
    let mut rng = StdRng::seed_from_u64(args.seed);

    // Troves sized debt-first: pick a net debt and a target ICR, derive the
    // collateral that produces it at the opening price.
    for index in 1..=args.troves {
        let owner = sim_address(index);
        let net_debt = rng.gen_range(1_800u128..=6_000) * DECIMAL_PRECISION;
        let target_pct = rng.gen_range(115u128..=250);
        let composite = composite_debt(net_debt, params.gas_compensation)?;
        let collateral = mul_div(
            mul_div(composite, target_pct, 100)?,
            DECIMAL_PRECISION,
            open_price,
        )?;
        borrower::open_trove(&mut state, &feed, owner, collateral, net_debt, None)?;
    }

    let depositor = Address::new([0xAA; 20]);
    if pool_deposit > 0 {
        state.stability_pool.provide(depositor, pool_deposit)?;
    }

    let troves_before = state.ledger.active_trove_count();
    let debt_before = state.entire_system_debt();

    feed.set_price(drop_price)?;
    let mut engine = LiquidationEngine::new();
    let caller = Address::new([0xCC; 20]);
    let totals = engine.liquidate_troves(&mut state, &feed, args.max, caller)?;
    state.verify_invariants()?;

    let digest = hex::encode(state.digest());

    if args.json {
        let outcome = serde_json::json!({
            "seed": args.seed,
            "price": {
                "open": format_fixed(open_price),
                "drop_to": format_fixed(drop_price),
            },
            "troves_before": troves_before,
            "troves_after": state.ledger.active_trove_count(),
            "totals": totals,
            "pool_remaining": state.stability_pool.total_debt_token_deposits().to_string(),
            "default_pool_debt": state.ledger.default_pool().debt.to_string(),
            "state_digest": digest,
        });
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let _ = term.write_line(&format!(
        "\n{} Opened {} troves at {} ({} total debt), pool seeded with {}",
        style("→").cyan(),
        troves_before,
        format_usd(open_price),
        format_fusd(debt_before),
        format_fusd(pool_deposit)
    ));
    let _ = term.write_line(&format!(
        "{} Price dropped to {}, batch limit {}",
        style("→").cyan(),
        format_usd(drop_price),
        args.max
    ));

    if totals.troves_liquidated == 0 {
        let _ = term.write_line(&format!(
            "\n{} No trove fell below the minimum collateral ratio",
            style("✓").green()
        ));
        let _ = term.write_line(&format!("  State digest: {}", style(digest).dim()));
        return Ok(());
    }

    let _ = term.write_line(&format!(
        "\n{} Liquidated {} troves",
        style("✓").green(),
        style(totals.troves_liquidated).bold()
    ));
    for event in engine.recent_events() {
        let _ = term.write_line(&format!(
            "  {} {} debt {} at ICR {}",
            style("●").red(),
            event.owner,
            format_fusd(event.debt_liquidated),
            format_ratio(event.icr)
        ));
    }

    let _ = term.write_line(&format!(
        "\n  Debt liquidated:      {}",
        style(format_fusd(totals.total_debt_liquidated)).green()
    ));
    let _ = term.write_line(&format!(
        "  Offset against pool:  {}",
        format_fusd(totals.total_debt_offset)
    ));
    let _ = term.write_line(&format!(
        "  Redistributed:        {}",
        format_fusd(totals.total_debt_redistributed)
    ));
    let _ = term.write_line(&format!(
        "  Caller compensation:  {} FIL",
        style(format_fixed(totals.total_gas_compensation)).yellow()
    ));
    let _ = term.write_line(&format!(
        "  Pool remaining:       {}",
        format_fusd(state.stability_pool.total_debt_token_deposits())
    ));
    let _ = term.write_line(&format!(
        "  Troves remaining:     {}",
        state.ledger.active_trove_count()
    ));
    let _ = term.write_line(&format!("  State digest:         {}", style(digest).dim()));

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn panel_row(term: &Term, label: &str, value: &str) {
    let _ = term.write_line(&format!(
        "{}  {:<28}{:>28}  {}",
        style("║").cyan(),
        label,
        style(value).green(),
        style("║").cyan()
    ));
}

/// Derive a stable address from a simulation index
fn sim_address(index: u32) -> Address {
    let mut bytes = [0u8; 20];
    bytes[16..20].copy_from_slice(&index.to_be_bytes());
    Address::new(bytes)
}

/// Parse a decimal string into an 18-decimal fixed-point amount
fn parse_fixed(input: &str) -> anyhow::Result<u128> {
    let trimmed = input.trim();
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        anyhow::bail!("empty amount");
    }
    if frac_part.len() > 18 {
        anyhow::bail!("at most 18 decimal places supported: {}", input);
    }

    let int: u128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid amount: {}", input))?
    };
    let frac: u128 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{:0<18}", frac_part);
        padded
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid amount: {}", input))?
    };

    int.checked_mul(DECIMAL_PRECISION)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(|| anyhow::anyhow!("amount out of range: {}", input))
}

/// Render an 18-decimal fixed-point amount, trailing zeros trimmed
fn format_fixed(value: u128) -> String {
    let int = value / DECIMAL_PRECISION;
    let frac = value % DECIMAL_PRECISION;
    if frac == 0 {
        return int.to_string();
    }
    let mut frac_str = format!("{:018}", frac);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", int, frac_str)
}

fn format_usd(value: u128) -> String {
    format!("${}", format_fixed(value))
}

fn format_fusd(value: u128) -> String {
    format!("{} fUSD", format_fixed(value))
}

/// Render an 18-decimal ratio as a percentage
fn format_ratio(ratio: u128) -> String {
    if ratio > u128::MAX / 100 {
        return "inf".to_string();
    }
    format!("{}%", format_fixed(ratio * 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixed() {
        assert_eq!(parse_fixed("400").unwrap(), 400 * DECIMAL_PRECISION);
        assert_eq!(parse_fixed("0.5").unwrap(), DECIMAL_PRECISION / 2);
        assert_eq!(parse_fixed("1.25").unwrap(), 1_250_000_000_000_000_000);
        assert_eq!(parse_fixed(".5").unwrap(), DECIMAL_PRECISION / 2);
        assert_eq!(parse_fixed("0").unwrap(), 0);
        assert!(parse_fixed("").is_err());
        assert!(parse_fixed("1.0000000000000000001").is_err());
        assert!(parse_fixed("abc").is_err());
    }

    #[test]
    fn test_format_fixed_round_trip() {
        for value in [0, 1, DECIMAL_PRECISION, 1_250_000_000_000_000_000, 400 * DECIMAL_PRECISION]
        {
            assert_eq!(parse_fixed(&format_fixed(value)).unwrap(), value);
        }
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(DECIMAL_PRECISION), "100%");
        assert_eq!(format_ratio(1_100_000_000_000_000_000), "110%");
        assert_eq!(format_ratio(u128::MAX), "inf");
    }
}
