use futures::{Stream, StreamExt};
use ragcrust_common::Result;
use tokio::sync::mpsc;

use super::tier::TierFailure;

/// Producer side of a reply stream. Counts what it has forwarded so tiers
/// can tell "failed before output" from "failed mid-stream".
pub(crate) struct FragmentSink {
    tx: mpsc::Sender<String>,
    emitted: usize,
}

impl FragmentSink {
    pub(crate) fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx, emitted: 0 }
    }

    /// Forward one fragment. Empty fragments are dropped. Fails with
    /// [`TierFailure::Cancelled`] once the consumer has gone away.
    pub(crate) async fn send(&mut self, fragment: String) -> std::result::Result<(), TierFailure> {
        if fragment.is_empty() {
            return Ok(());
        }
        self.tx
            .send(fragment)
            .await
            .map_err(|_| TierFailure::Cancelled)?;
        self.emitted += 1;
        Ok(())
    }

    pub(crate) fn emitted(&self) -> usize {
        self.emitted
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Pump a provider text stream into `sink`.
///
/// An error before any fragment fails the tier. An error after output has
/// started commits the tier and is returned as `Ok(Some(message))`.
pub(crate) async fn forward_stream<S>(
    mut stream: S,
    sink: &mut FragmentSink,
) -> std::result::Result<Option<String>, TierFailure>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let start = sink.emitted();
    while let Some(item) = stream.next().await {
        match item {
            Ok(text) => sink.send(text).await?,
            Err(e) if sink.emitted() == start => {
                return Err(TierFailure::Unavailable(e.to_string()));
            }
            Err(e) => return Ok(Some(e.to_string())),
        }
    }

    if sink.emitted() == start {
        Err(TierFailure::NoOutput)
    } else {
        Ok(None)
    }
}
