use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for apt, image pulls and certbot. Shows elapsed time since those
/// can take minutes.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒", "●"]),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Stage header, e.g. `[4/12] Installing Docker Engine`
pub fn step(num: usize, total: usize, msg: &str) {
    println!();
    println!(
        "{} {}",
        style(format!("[{:>2}/{}]", num, total)).bold().cyan(),
        style(msg).bold()
    );
}

pub fn success(msg: &str) {
    println!("  {} {}", style("✓").green(), msg);
}

pub fn warning(msg: &str) {
    eprintln!("  {} {}", style("!").bold().yellow(), msg);
}

pub fn info(msg: &str) {
    println!("  {} {}", style("→").blue(), msg);
}

/// Title with a rule under it, no wider than the terminal
pub fn banner(msg: &str) {
    let cols = Term::stdout().size().1 as usize;
    let width = msg.chars().count().clamp(1, cols.max(1));
    println!("\n{}", style(msg).bold());
    println!("{}", style("─".repeat(width)).dim());
}

/// Aligned `label: value` line for reports
pub fn field(label: &str, value: &str) {
    println!("  {:<18} {}", style(format!("{}:", label)).dim(), value);
}
