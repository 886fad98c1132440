use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "kondate",
    version,
    about = "Menu-planning assistant engine (planner-less scripted mode)"
)]
pub struct Args {
    /// Owner id attributed to every request.
    #[arg(long, default_value = "local-user")]
    pub owner: String,

    /// Session id to continue; a fresh one is generated when omitted.
    #[arg(long)]
    pub session: Option<String>,

    /// Progress rendering: text or bar.
    #[arg(long, default_value = "text")]
    pub progress: String,

    /// One-shot request; the interactive stdin loop starts when omitted.
    #[arg(long)]
    pub request: Option<String>,
}
