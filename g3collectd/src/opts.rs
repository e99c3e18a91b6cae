/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, value_parser};
use clap_complete::Shell;

use crate::config::ProxyConfig;

const ARGS_COMPLETION: &str = "completion";
const ARGS_VERSION: &str = "version";
const ARGS_CONFIG_FILE: &str = "config-file";
const ARGS_PROXY_PORT: &str = "proxy-port";
const ARGS_TYPESDB: &str = "typesdb";
const ARGS_LOG_FILE: &str = "log-file";
const ARGS_VERBOSE: &str = "verbose";
const ARGS_INFLUXDB: &str = "influxdb";
const ARGS_USERNAME: &str = "username";
const ARGS_PASSWORD: &str = "password";
const ARGS_DATABASE: &str = "database";
const ARGS_NORMALIZE: &str = "normalize";

#[derive(Debug)]
pub struct ProcArgs {
    pub config: ProxyConfig,
    pub config_file: Option<PathBuf>,
}

fn build_cli_args() -> Command {
    Command::new(crate::build::PKG_NAME)
        .disable_version_flag(true)
        .arg(
            Arg::new(ARGS_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(ARGS_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long("version"),
        )
        .arg(
            Arg::new(ARGS_CONFIG_FILE)
                .help("Config file path")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .short('c')
                .long("config-file"),
        )
        .arg(
            Arg::new(ARGS_PROXY_PORT)
                .help("Port to listen on for collectd datagrams [default: 8096]")
                .num_args(1)
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .short('p')
                .long("proxy-port"),
        )
        .arg(
            Arg::new(ARGS_TYPESDB)
                .help("Path to collectd types.db [default: types.db]")
                .num_args(1)
                .value_name("TYPES DB")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .short('t')
                .long("typesdb"),
        )
        .arg(
            Arg::new(ARGS_LOG_FILE)
                .help("Log file path, use '-' for stderr [default: proxy.log]")
                .num_args(1)
                .value_name("LOG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .short('l')
                .long("log-file"),
        )
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Log every sample and point")
                .action(ArgAction::SetTrue)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_INFLUXDB)
                .help("InfluxDB server address [default: localhost:8086]")
                .num_args(1)
                .value_name("HOST:PORT")
                .value_hint(ValueHint::Hostname)
                .short('i')
                .long("influxdb"),
        )
        .arg(
            Arg::new(ARGS_USERNAME)
                .help("InfluxDB username [default: root]")
                .num_args(1)
                .value_name("USERNAME")
                .short('u')
                .long("username"),
        )
        .arg(
            Arg::new(ARGS_PASSWORD)
                .help("InfluxDB password [default: root]")
                .num_args(1)
                .value_name("PASSWORD")
                .short('P')
                .long("password"),
        )
        .arg(
            Arg::new(ARGS_DATABASE)
                .help("InfluxDB database")
                .num_args(1)
                .value_name("DATABASE")
                .short('d')
                .long("database"),
        )
        .arg(
            Arg::new(ARGS_NORMALIZE)
                .help("Convert COUNTER and DERIVE values to per second rates [default: true]")
                .num_args(1)
                .value_name("BOOL")
                .value_parser(value_parser!(bool))
                .short('n')
                .long("normalize"),
        )
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    let args_parser = build_cli_args();
    let args = args_parser.get_matches();
    parse_matches(&args)
}

fn parse_matches(args: &ArgMatches) -> anyhow::Result<Option<ProcArgs>> {
    if let Some(target) = args.get_one::<Shell>(ARGS_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(None);
    }

    if args.get_flag(ARGS_VERSION) {
        crate::build::print_version(args.get_flag(ARGS_VERBOSE));
        return Ok(None);
    }

    let mut config = ProxyConfig::default();
    let config_file = args.get_one::<PathBuf>(ARGS_CONFIG_FILE).cloned();
    if let Some(path) = &config_file {
        config.load_file(path)?;
    }

    // flags given on the command line override the config file
    if let Some(port) = args.get_one::<u16>(ARGS_PROXY_PORT) {
        config.listen.set_port(*port);
    }
    if let Some(path) = args.get_one::<PathBuf>(ARGS_TYPESDB) {
        config.typesdb = path.clone();
    }
    if let Some(path) = args.get_one::<PathBuf>(ARGS_LOG_FILE) {
        config.log_file = path.clone();
    }
    if args.get_flag(ARGS_VERBOSE) {
        config.verbose = true;
    }
    if let Some(server) = args.get_one::<String>(ARGS_INFLUXDB) {
        config.influxdb.server = server.clone();
    }
    if let Some(username) = args.get_one::<String>(ARGS_USERNAME) {
        config.influxdb.username = username.clone();
    }
    if let Some(password) = args.get_one::<String>(ARGS_PASSWORD) {
        config.influxdb.password = password.clone();
    }
    if let Some(database) = args.get_one::<String>(ARGS_DATABASE) {
        config.influxdb.database = database.clone();
    }
    if let Some(normalize) = args.get_one::<bool>(ARGS_NORMALIZE) {
        config.normalize = *normalize;
    }

    config.check().context("invalid config")?;
    Ok(Some(ProcArgs {
        config,
        config_file,
    }))
}
