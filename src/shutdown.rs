use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Stop token for a marking run, tripped by SIGINT or SIGTERM.
///
/// Hand it to [`MarkingPool::run`](crate::pool::MarkingPool::run). A tripped
/// token never interrupts grading: each marker completes its claimed
/// question, then checks the token before reviewing the rubric again and
/// exits. Idle markers wake up early. If the signal streams cannot be
/// registered the token is returned anyway and only the terminal submission
/// ends the run.
pub fn install_shutdown_handler() -> CancellationToken {
    let stop = CancellationToken::new();
    let trip = stop.clone();

    tokio::spawn(async move {
        let streams = signal(SignalKind::terminate())
            .and_then(|term| Ok((term, signal(SignalKind::interrupt())?)));
        let (mut sigterm, mut sigint) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Signal handlers unavailable, marking runs to completion"
                );
                return;
            }
        };

        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = received, "Stopping markers after their current question");
        trip.cancel();
    });

    stop
}
