/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use anyhow::anyhow;
use chrono::Local;
use flume::{Receiver, Sender};
use slog::{Drain, Never, OwnedKVList, Record, Serializer, KV, slog_o};
use slog_scope::GlobalLoggerGuard;

const PROCESS_LOG_THREAD_NAME: &str = "log-process";
const LOG_CHANNEL_CAPACITY: usize = 1024;

/// Keep it alive until the process exits, the pending records are written on drop
pub struct LoggerGuard {
    scope_guard: Option<GlobalLoggerGuard>,
    io_thread: Option<JoinHandle<()>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        // the drain and its sender go away with the global logger
        drop(self.scope_guard.take());
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}

pub fn setup(log_file: &Path, verbose: bool) -> anyhow::Result<LoggerGuard> {
    let io: Box<dyn Write + Send> = if log_file.as_os_str() == "-" {
        Box::new(io::stderr())
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| anyhow!("failed to open log file {}: {e}", log_file.display()))?;
        Box::new(BufWriter::new(file))
    };

    let (sender, receiver) = flume::bounded::<String>(LOG_CHANNEL_CAPACITY);
    let io_thread = std::thread::Builder::new()
        .name(PROCESS_LOG_THREAD_NAME.to_string())
        .spawn(move || run_io(receiver, io))
        .map_err(|e| anyhow!("failed to spawn log thread: {e}"))?;

    let logger = slog::Logger::root(AsyncLogDrain { sender }, slog_o!());
    let scope_guard = slog_scope::set_global_logger(logger);

    let log_level = if verbose {
        log::Level::Trace
    } else {
        log::Level::Info
    };
    slog_stdlog::init_with_level(log_level)
        .map_err(|e| anyhow!("failed to set process logger: {e}"))?;

    Ok(LoggerGuard {
        scope_guard: Some(scope_guard),
        io_thread: Some(io_thread),
    })
}

fn run_io(receiver: Receiver<String>, mut io: Box<dyn Write + Send>) {
    while let Ok(line) = receiver.recv() {
        let _ = io.write_all(line.as_bytes());
        while let Ok(line) = receiver.try_recv() {
            let _ = io.write_all(line.as_bytes());
        }
        let _ = io.flush();
    }
}

struct AsyncLogDrain {
    sender: Sender<String>,
}

impl Drain for AsyncLogDrain {
    type Ok = ();
    type Err = Never;

    fn log(&self, record: &Record, logger_values: &OwnedKVList) -> Result<(), Never> {
        let line = format_record(record, logger_values);
        // dropped if the io thread can not keep up
        let _ = self.sender.try_send(line);
        Ok(())
    }
}

fn format_record(record: &Record, logger_values: &OwnedKVList) -> String {
    let mut line = String::with_capacity(128);
    let _ = write!(
        line,
        "{} {}",
        Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
        record.level()
    );

    let mut kv_formatter = FormatterKv(&mut line);
    let _ = logger_values.serialize(record, &mut kv_formatter);
    let _ = record.kv().serialize(record, &mut kv_formatter);

    let _ = write!(line, " {}", record.msg());
    match record.file().rsplit_once('/') {
        Some((_, filename)) => {
            let _ = write!(line, " <{}({filename}:{})>", record.module(), record.line());
        }
        None => {
            let _ = write!(line, " <{}>", record.module());
        }
    }
    line.push('\n');
    line
}

struct FormatterKv<'a>(&'a mut String);

impl Serializer for FormatterKv<'_> {
    fn emit_arguments(&mut self, key: slog::Key, value: &fmt::Arguments) -> slog::Result {
        let _ = write!(self.0, " {key}: {value},");
        Ok(())
    }
}
