// Fantasy assistant entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Ensure config files exist, load config
// 3. Fetch the statistics snapshot from the feed
// 4. Load the FDR override layer
// 5. Compute the XP table over the planning horizon
// 6. Optimize the squad, pick the lineup
// 7. Print the report (squad, lineup, transfer ideas, fixture grid)

use fpl_assistant::config;
use fpl_assistant::engine::{lineup, squad, transfer, xp};
use fpl_assistant::fdr;
use fpl_assistant::feed::{self, StatFeed};
use fpl_assistant::stats::{Gameweek, Position, StatSnapshot};

use anyhow::Context;
use std::path::Path;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Fantasy assistant starting up");

    // 2. Ensure config files exist, load config
    let base_dir = std::env::current_dir().context("cannot determine working directory")?;
    if config::ensure_config_files(&base_dir).context("failed to seed default config")? {
        info!("Default config written to config/rules.toml");
    }
    let cfg = config::load_config_from(&base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: budget {}, club limit {}, {} formations, horizon {} gameweeks",
        cfg.rules.budget,
        cfg.rules.club_limit,
        cfg.rules.formations.len(),
        cfg.model.horizon
    );

    // 3. Fetch the statistics snapshot from the feed
    let feed = feed::FplFeed::new(&cfg.feed);
    let snapshot = feed
        .fetch_snapshot()
        .await
        .context("failed to fetch the statistics snapshot")?;

    let next_event = snapshot
        .next_event
        .context("the feed reports no upcoming gameweek; nothing to plan for")?;
    let horizon: Vec<Gameweek> = (next_event..next_event + cfg.model.horizon).collect();

    // 4. Load the FDR override layer
    let overrides_path = Path::new(&cfg.feed.overrides_path);
    let provider = fdr::DifficultyProvider::load(overrides_path)
        .context("failed to load difficulty overrides")?;

    // 5. Compute the XP table over the planning horizon
    let xp_table = xp::compute_xp_for_all(
        &snapshot.players,
        &horizon,
        &snapshot,
        &provider,
        &cfg.model,
    );
    info!("XP table computed: {} entries", xp_table.len());

    // 6. Optimize the squad, pick the lineup
    let best_squad = squad::optimize_squad(&snapshot.players, &xp_table, &horizon, &cfg.rules)
        .context("squad optimization failed")?;
    let best_lineup =
        lineup::select_lineup(&best_squad, &cfg.rules).context("lineup selection failed")?;

    // 7. Print the report
    print_squad(&best_squad, &snapshot, &cfg.rules);
    print_lineup(&best_lineup, &best_squad);
    print_transfer_ideas(&best_squad, &best_lineup, &snapshot, &xp_table, &horizon, &cfg.rules);
    print_fixture_grid(&snapshot, &provider, cfg.model.horizon);

    info!("Report complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Report printing
// ---------------------------------------------------------------------------

fn print_squad(best: &squad::Squad, snapshot: &StatSnapshot, rules: &fpl_assistant::config::RulesConfig) {
    println!("=== Optimized squad ===");
    println!(
        "Cost {} / budget {} | projected {:.1} pts over the horizon",
        format_price(best.total_price()),
        format_price(rules.budget),
        best.total_xp()
    );
    for pos in Position::all() {
        let mut line: Vec<_> = best
            .players()
            .iter()
            .filter(|p| p.position == pos)
            .collect();
        line.sort_by(|a, b| b.xp.partial_cmp(&a.xp).unwrap_or(std::cmp::Ordering::Equal));
        for p in line {
            let club = snapshot
                .team(p.team)
                .map(|t| t.display_code())
                .unwrap_or_else(|| "???".to_string());
            println!(
                "  {:<4} {:<22} {:<4} {:>6} {:>6.1}",
                pos.display_str(),
                p.name,
                club,
                format_price(p.price),
                p.xp
            );
        }
    }
    println!();
}

fn print_lineup(best: &lineup::Lineup, squad: &squad::Squad) {
    println!("=== Starting XI ({}) ===", best.formation.label());
    for p in &best.starters {
        let armband = if p.id == best.captain {
            " (C)"
        } else if p.id == best.vice_captain {
            " (V)"
        } else {
            ""
        };
        println!(
            "  {:<4} {:<22} {:>6.1}{armband}",
            p.position.display_str(),
            p.name,
            p.xp
        );
    }
    println!("Bench:");
    for p in &best.bench {
        println!("  {:<4} {:<22} {:>6.1}", p.position.display_str(), p.name, p.xp);
    }
    println!(
        "Projected starting XI: {:.1} pts (captain doubles {})",
        best.starting_xp(),
        squad
            .player(best.captain)
            .map(|p| p.name.as_str())
            .unwrap_or("?")
    );
    println!();
}

/// Suggest replacements for the weakest starter. A squad fresh out of the
/// optimizer rarely has an upgrade, so a quiet result here is normal.
fn print_transfer_ideas(
    best: &squad::Squad,
    best_lineup: &lineup::Lineup,
    snapshot: &StatSnapshot,
    xp_table: &xp::XpTable,
    horizon: &[Gameweek],
    rules: &fpl_assistant::config::RulesConfig,
) {
    let weakest = best_lineup
        .starters
        .iter()
        .min_by(|a, b| a.xp.partial_cmp(&b.xp).unwrap_or(std::cmp::Ordering::Equal));
    let Some(weakest) = weakest else {
        return;
    };

    println!("=== Transfer ideas for {} ===", weakest.name);
    match transfer::suggest_transfers(best, weakest.id, &snapshot.players, xp_table, horizon, rules)
    {
        Ok(proposals) => {
            for proposal in proposals.take(5) {
                println!(
                    "  {} -> {} ({}) {:+.1} pts",
                    proposal.outgoing.name,
                    proposal.incoming.name,
                    format_price(proposal.incoming.price),
                    proposal.gain
                );
            }
        }
        Err(e) => {
            warn!("transfer advisor: {e}");
            println!("  none: {e}");
        }
    }
    println!();
}

fn print_fixture_grid(snapshot: &StatSnapshot, provider: &fdr::DifficultyProvider, next_n: u32) {
    println!("=== Fixture difficulty, next {next_n} gameweeks (easiest first) ===");
    for schedule in fdr::team_schedules(snapshot, provider, next_n) {
        let run: Vec<String> = schedule
            .entries
            .iter()
            .map(|e| {
                let venue = if e.is_home { "H" } else { "A" };
                format!("{}({venue}{})", e.opponent_code, e.difficulty)
            })
            .collect();
        println!(
            "  {:<22} total {:>2} | {}",
            schedule.team_name,
            schedule.total_difficulty,
            run.join(" ")
        );
    }
}

/// Render a tenth-of-a-million price as the familiar decimal form.
fn format_price(price: u32) -> String {
    format!("{}.{}", price / 10, price % 10)
}

/// Initialize tracing to log to a file so the report stays clean on stdout.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("fplassist.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fpl_assistant=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
