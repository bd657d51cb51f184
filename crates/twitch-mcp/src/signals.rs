//! Termination-signal subscription owned by the supervisor for the lifetime of the child.

use std::io;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A termination request to pass on to the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl Signal {
    /// Name as understood by `kill -s`.
    pub fn name(self) -> &'static str {
        match self {
            Signal::Interrupt => "INT",
            Signal::Terminate => "TERM",
        }
    }
}

/// Delivers incoming termination signals as a stream. Unsubscribes when dropped.
pub struct SignalRelay {
    rx: mpsc::UnboundedReceiver<Signal>,
    listener: Option<JoinHandle<()>>,
}

impl SignalRelay {
    /// Start listening for SIGINT and SIGTERM (Ctrl-C on Windows). Needs a running tokio runtime.
    pub fn subscribe() -> io::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = listen(tx)?;
        Ok(Self {
            rx,
            listener: Some(listener),
        })
    }

    /// A relay fed by hand instead of by the operating system.
    pub fn manual() -> (mpsc::UnboundedSender<Signal>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, listener: None })
    }

    /// Next signal. Pending forever once the source is gone.
    pub async fn recv(&mut self) -> Signal {
        match self.rx.recv().await {
            Some(signal) => signal,
            None => std::future::pending().await,
        }
    }
}

impl Drop for SignalRelay {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(unix)]
fn listen(tx: mpsc::UnboundedSender<Signal>) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = interrupt.recv() => Signal::Interrupt,
                Some(()) = terminate.recv() => Signal::Terminate,
                else => break,
            };
            if tx.send(received).is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
fn listen(tx: mpsc::UnboundedSender<Signal>) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(Signal::Interrupt).is_err() {
                break;
            }
        }
    }))
}

/// Send `signal` to the process `pid`.
#[cfg(unix)]
pub async fn deliver(signal: Signal, pid: u32) -> io::Result<()> {
    let status = tokio::process::Command::new("kill")
        .args(["-s", signal.name(), &pid.to_string()])
        .status()
        .await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!(
            "kill -s {} {pid} exited with {status}",
            signal.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_relay_delivers_in_order() {
        let (tx, mut relay) = SignalRelay::manual();
        tx.send(Signal::Interrupt).unwrap();
        tx.send(Signal::Terminate).unwrap();
        assert_eq!(relay.recv().await, Signal::Interrupt);
        assert_eq!(relay.recv().await, Signal::Terminate);
    }

    #[tokio::test]
    async fn closed_relay_never_yields() {
        let (tx, mut relay) = SignalRelay::manual();
        drop(tx);
        let next = tokio::time::timeout(std::time::Duration::from_millis(50), relay.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn subscription_can_be_dropped() {
        let relay = SignalRelay::subscribe().unwrap();
        drop(relay);
    }

    #[test]
    fn kill_names() {
        assert_eq!(Signal::Interrupt.name(), "INT");
        assert_eq!(Signal::Terminate.name(), "TERM");
    }
}
