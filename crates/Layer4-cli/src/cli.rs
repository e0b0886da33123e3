//! Plan commands

use crate::plan;
use anyhow::Context;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use weave_foundation::EngineConfig;
use weave_task::{combine, ExecutionContext, OutputResult, Registry, TaskRef, TaskStatus};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub timeout: Option<u64>,
    pub save: bool,
    pub quiet: bool,
}

/// Execute a plan file. Returns whether the root task succeeded.
pub async fn run_plan(
    path: &Path,
    options: &RunOptions,
    config: &EngineConfig,
) -> anyhow::Result<bool> {
    let root = plan::load(path)?;
    let registry = Registry::with_standard_executors(config);

    let token = CancellationToken::new();
    let ctx = ExecutionContext::from_token(token.clone());
    let ctx = match options.timeout {
        Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
        None => ctx,
    };

    // Ctrl-C cancels the run
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            signal_token.cancel();
        }
    });

    info!("Running plan {} (root {})", path.display(), root.id());
    let mut stream = registry
        .execute(&ctx, root.clone())
        .await
        .with_context(|| format!("Cannot run plan {}", path.display()))?;

    let result = if options.quiet {
        let result = combine(&ctx, stream).await;
        print_result(&result);
        result
    } else {
        let mut last = None;
        while let Some(message) = stream.recv().await {
            print_message(&message);
            last = Some(message);
        }
        last.unwrap_or_else(|| root.read().stored_output())
    };

    if options.save {
        plan::save(path, &root)?;
        debug!("Saved plan {}", path.display());
    }

    println!("\n{}", root.read().summary());
    Ok(result.status == TaskStatus::Succeeded)
}

pub fn show_plan(path: &Path) -> anyhow::Result<()> {
    let root = plan::load(path)?;
    print_tree(&root);
    Ok(())
}

pub fn reset_plan(path: &Path) -> anyhow::Result<()> {
    let root = plan::load(path)?;
    root.write().reset();
    plan::save(path, &root)?;
    println!("Reset {} tasks in {}", root.read().summary().total, path.display());
    Ok(())
}

fn print_message(message: &OutputResult) {
    let time = chrono::Local::now().format("%H:%M:%S%.3f");
    if !message.message.is_empty() {
        println!(
            "[{}] {} {} {}",
            time,
            message.status.symbol(),
            message.task_id,
            message.message
        );
    }
    if !message.result_data.is_empty() {
        print!("{}", message.result_data);
        if !message.result_data.ends_with('\n') {
            println!();
        }
    }
    if !message.error.is_empty() {
        eprintln!("[{}] error: {}", time, message.error);
    }
}

fn print_result(result: &OutputResult) {
    println!("{} {} {}", result.status.symbol(), result.task_id, result.message);
    if !result.result_data.is_empty() {
        println!("{}", result.result_data.trim_end());
    }
    if !result.error.is_empty() {
        eprintln!("error: {}", result.error);
    }
}

fn print_tree(root: &TaskRef) {
    root.read().walk(&mut |depth, task| {
        let description = if task.description.is_empty() {
            String::new()
        } else {
            format!(" - {}", task.description)
        };
        println!(
            "{}{} {} [{}]{}",
            "  ".repeat(depth),
            task.status().symbol(),
            task.task_id,
            task.task_type(),
            description
        );
    });
    println!("\n{}", root.read().summary());
}
