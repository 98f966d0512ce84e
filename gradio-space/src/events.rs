use anyhow::{Result, anyhow};
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde_json::Value;

const NO_MESSAGE: &str = "the Space reported an error without a message";

/// Reads a `/call/{api}/{event_id}` stream until the call finishes.
///
/// Returns on the first `complete` or `error` event; the server may keep the
/// connection open with heartbeats after that.
pub async fn await_completion<S, B, E>(body: S) -> Result<Vec<Value>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut events = std::pin::pin!(body.eventsource());

    while let Some(event) = events.next().await {
        let event = event.map_err(|e| anyhow!("Result stream was interrupted: {e}"))?;
        tracing::debug!("Event `{}`", event.event);
        if let Some(result) = completion(&event.event, &event.data) {
            return result;
        }
    }

    Err(anyhow!("Event stream ended without a result"))
}

/// Outcome of one event: the output array of `complete`, an error for
/// `error`, `None` for anything else (`generating`, `heartbeat`, ...).
pub fn completion(name: &str, data: &str) -> Option<Result<Vec<Value>>> {
    match name {
        "complete" => Some(outputs(data)),
        "error" => Some(Err(anyhow!("Remote error: {}", error_message(data)))),
        _ => None,
    }
}

fn outputs(data: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| anyhow!("Failed to parse completion payload: {e}"))?;
    Ok(match value {
        Value::Array(outputs) => outputs,
        other => vec![other],
    })
}

fn error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(s)) => s,
        Ok(Value::Null) => NO_MESSAGE.to_string(),
        Ok(other) => other.to_string(),
        Err(_) if data.trim().is_empty() => NO_MESSAGE.to_string(),
        Err(_) => data.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::stream;

    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, std::io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn complete_yields_every_output() {
        let outputs = completion("complete", "[\"a.png\", {\"path\": \"b.png\"}]")
            .unwrap()
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0], Value::String("a.png".into()));
        assert_eq!(outputs[1]["path"], "b.png");
    }

    #[test]
    fn scalar_completion_is_wrapped() {
        let outputs = completion("complete", "\"x.png\"").unwrap().unwrap();
        assert_eq!(outputs, vec![Value::String("x.png".into())]);
    }

    #[test]
    fn error_event_becomes_error() {
        let err = completion("error", "\"GPU quota exceeded\"").unwrap().unwrap_err();
        assert!(err.to_string().contains("GPU quota exceeded"));
    }

    #[test]
    fn null_error_has_placeholder_message() {
        let err = completion("error", "null").unwrap().unwrap_err();
        assert!(err.to_string().contains("without a message"));
    }

    #[test]
    fn progress_events_are_not_terminal() {
        assert!(completion("generating", "null").is_none());
        assert!(completion("heartbeat", "null").is_none());
    }

    #[tokio::test]
    async fn returns_once_complete_arrives_while_the_stream_stays_open() {
        let body = chunks(&[
            "event: generating\ndata: null\n\n",
            ": keep-alive\r\nevent: compl",
            "ete\r\ndata: [\"done\"]\r\n\r\n",
        ])
        .chain(stream::pending());

        let outputs = tokio::time::timeout(Duration::from_secs(5), await_completion(body))
            .await
            .expect("completion should not wait for the stream to close")
            .unwrap();

        assert_eq!(outputs, vec![Value::String("done".into())]);
    }

    #[tokio::test]
    async fn error_event_ends_the_wait() {
        let body = chunks(&["event: error\ndata: \"Space crashed\"\n\n"]).chain(stream::pending());

        let err = tokio::time::timeout(Duration::from_secs(5), await_completion(body))
            .await
            .expect("error should end the wait")
            .unwrap_err();

        assert!(err.to_string().contains("Space crashed"));
    }

    #[tokio::test]
    async fn closed_stream_without_result_is_an_error() {
        let body = chunks(&["event: heartbeat\ndata: null\n\n"]);
        assert!(await_completion(body).await.is_err());
    }
}
