/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::poll_fn;

use anyhow::anyhow;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

/// The first signal starts the graceful shutdown, the second one exits at once
#[derive(Clone)]
struct QuitAction {
    quit: CancellationToken,
}

impl QuitAction {
    fn run(&self, signal: &str) {
        if self.quit.is_cancelled() {
            warn!("got {signal} again while shutting down, exit now");
            std::process::exit(1);
        }
        info!("got {signal}, start graceful shutdown");
        self.quit.cancel();
    }
}

#[cfg(unix)]
pub fn register(quit: CancellationToken) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let action = QuitAction { quit };
    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::quit(), "SIGQUIT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let mut sig =
            signal(kind).map_err(|e| anyhow!("failed to create {name} listener: {e}"))?;
        let action = action.clone();
        tokio::spawn(async move {
            while poll_fn(|cx| sig.poll_recv(cx)).await.is_some() {
                action.run(name);
            }
        });
    }
    Ok(())
}

#[cfg(windows)]
pub fn register(quit: CancellationToken) -> anyhow::Result<()> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()
        .map_err(|e| anyhow!("failed to create ctrl-c listener: {e}"))?;
    let action = QuitAction { quit };
    tokio::spawn(async move {
        while ctrl_c.recv().await.is_some() {
            action.run("ctrl-c");
        }
    });
    Ok(())
}
