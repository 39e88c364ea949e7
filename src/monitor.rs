//! Signal monitor

use std::io;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(unix)] {
        use futures::future::{self, Either, FutureExt};
        use log::info;
        use tokio::signal::unix::{signal, SignalKind};

        /// Create a monitor future for signals
        ///
        /// It will exit when received `SIGTERM` or `SIGINT`.
        pub async fn create_signal_monitor() -> io::Result<()> {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            let signal_name = match future::select(sigterm.recv().boxed(), sigint.recv().boxed()).await {
                Either::Left(..) => "SIGTERM",
                Either::Right(..) => "SIGINT",
            };

            info!("received {signal_name}, exiting");

            Ok(())
        }
    } else if #[cfg(windows)] {
        use log::info;
        use tokio::signal::ctrl_c;

        /// Create a monitor future for signals
        ///
        /// It will exit when received Ctrl-C.
        pub async fn create_signal_monitor() -> io::Result<()> {
            let _ = ctrl_c().await;
            info!("received CTRL-C, exiting");

            Ok(())
        }
    } else {
        /// Create a monitor future for signals
        ///
        /// The current platform has no signals to monitor, pends forever.
        pub async fn create_signal_monitor() -> io::Result<()> {
            futures::future::pending().await
        }
    }
}
