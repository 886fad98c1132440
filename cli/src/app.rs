use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use kondate_core::api::{ProcessOutcome, ProgressSink};
use kondate_core::config::AppConfig;
use kondate_core::Orchestrator;
use kondate_plugins::dispatch::{InventoryService, RecipeService, ServiceRegistry};
use kondate_plugins::planner::ScriptedPlanner;
use kondate_plugins::progress::{BarProgressSink, TextProgressSink};
use kondate_plugins::session::InMemorySessionStore;

use crate::commands::cli::Args;

pub async fn run(args: Args, cfg: AppConfig) -> anyhow::Result<i32> {
    let registry = ServiceRegistry::new()
        .register(Arc::new(RecipeService::seeded()))
        .register(Arc::new(InventoryService::with_inventory(
            &args.owner,
            &["じゃがいも", "たまねぎ", "にんじん", "鶏肉", "卵", "豆腐"],
        )));

    let sink: Arc<dyn ProgressSink> = match args.progress.as_str() {
        "bar" => Arc::new(BarProgressSink::new()),
        _ => Arc::new(TextProgressSink::new()),
    };

    let orchestrator = Orchestrator::new(
        Arc::new(ScriptedPlanner::new()),
        Arc::new(registry),
        Arc::new(InMemorySessionStore::new()),
        sink,
        &cfg,
    );

    orchestrator.sweep_sessions().await.ok();

    let mut state = LoopState {
        session_id: args
            .session
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        owner: args.owner.clone(),
        awaiting_confirmation: false,
    };
    info!(session_id = state.session_id.as_str(), "session ready");

    if let Some(request) = args.request.as_deref() {
        handle_line(&orchestrator, &mut state, request).await?;
        return Ok(0);
    }

    println!("kondate — リクエストを入力してください（例: 主菜を提案して / !select <task> <番号> / exit）");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        handle_line(&orchestrator, &mut state, line).await?;
    }

    Ok(0)
}

struct LoopState {
    session_id: String,
    owner: String,
    awaiting_confirmation: bool,
}

async fn handle_line(
    orchestrator: &Orchestrator,
    state: &mut LoopState,
    line: &str,
) -> anyhow::Result<()> {
    if let Some(rest) = line.strip_prefix("!select ") {
        return handle_selection(orchestrator, state, rest).await;
    }

    let outcome = orchestrator
        .process_request(
            line,
            &state.owner,
            Some(state.session_id.as_str()),
            state.awaiting_confirmation,
        )
        .await?;

    match outcome {
        ProcessOutcome::Reply {
            text,
            requires_selection,
            task_id,
            ..
        } => {
            state.awaiting_confirmation = false;
            println!("{text}");
            if requires_selection {
                if let Some(task_id) = task_id {
                    println!("→ !select {task_id} <番号> で選択");
                }
            }
        }
        ProcessOutcome::Confirmation {
            message,
            confirmation_session_id,
        } => {
            state.awaiting_confirmation = true;
            state.session_id = confirmation_session_id;
            println!("{message}");
        }
    }

    Ok(())
}

async fn handle_selection(
    orchestrator: &Orchestrator,
    state: &mut LoopState,
    rest: &str,
) -> anyhow::Result<()> {
    let mut parts = rest.split_whitespace();
    let task_id = parts.next().context("usage: !select <task> <番号>")?;
    let index: usize = parts
        .next()
        .context("usage: !select <task> <番号>")?
        .parse()
        .context("選択番号は数値で指定してください")?;

    let outcome = orchestrator
        .process_user_selection(task_id, index, &state.session_id, &state.owner, None)
        .await?;

    state.session_id = outcome.session_id.clone();

    if let Some(message) = &outcome.message {
        println!("{message}");
    }
    if let Some(menu) = &outcome.menu {
        println!("{}", serde_json::to_string_pretty(menu)?);
    }
    if let Some(request) = &outcome.next_stage_request {
        println!("→ 次のリクエスト: {request}");
    }
    if !outcome.success {
        println!("（選択をやり直してください）");
    }

    Ok(())
}
