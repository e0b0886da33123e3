//! Result combinator - reduce a stream to a single result

use crate::context::ExecutionContext;
use crate::state::TaskStatus;
use crate::stream::ResultStream;
use crate::task::OutputResult;
use tracing::debug;

/// Drain `stream` into one result.
///
/// Status, message, error and task id come from the last message seen;
/// `result_data` concatenates the data of every message in arrival order.
/// If `ctx` ends first, the result is `failed` with the context's error and
/// the data gathered so far. The producer is not waited for.
pub async fn combine(ctx: &ExecutionContext, mut stream: ResultStream) -> OutputResult {
    let mut last: Option<OutputResult> = None;
    let mut data = String::new();

    loop {
        tokio::select! {
            biased;
            err = ctx.wait_err() => {
                debug!("Stopped combining results: {}", err);
                let mut result = last.unwrap_or_default();
                result.status = TaskStatus::Failed;
                result.error = err.to_string();
                result.result_data = data;
                return result;
            }
            message = stream.recv() => match message {
                Some(message) => {
                    data.push_str(&message.result_data);
                    last = Some(message);
                }
                None => break,
            }
        }
    }

    let mut result = last.unwrap_or_default();
    result.result_data = data;
    result
}
