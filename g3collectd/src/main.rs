/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use anyhow::Context;
use log::{debug, error, info};

use g3collectd::config::ProxyConfig;
use g3collectd::typesdb::TypeCatalog;

fn main() -> anyhow::Result<()> {
    let Some(proc_args) =
        g3collectd::opts::parse_clap().context("failed to parse command line options")?
    else {
        return Ok(());
    };
    let config = proc_args.config;

    // set up process logger early, only proc args is used inside
    let _log_guard = g3collectd::log::setup(&config.log_file, config.verbose)
        .context("failed to setup process logger")?;
    if let Some(config_file) = &proc_args.config_file {
        debug!("loaded config from {}", config_file.display());
    }

    let catalog = match TypeCatalog::load(&config.typesdb) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("{e:?}");
            return Err(e);
        }
    };
    info!(
        "loaded {} types from {}",
        catalog.len(),
        config.typesdb.display()
    );

    match tokio_run(&config, Arc::new(catalog)) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{e:?}");
            Err(e)
        }
    }
}

fn tokio_run(config: &ProxyConfig, catalog: Arc<TypeCatalog>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    rt.block_on(g3collectd::serve::run(config, catalog))
}
