// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use secure_messaging_gateway::{
    activation::{Activation, ActivationMode, ActivationSettings, Activator},
    api::router,
    config::{GatewayConfig, LogFormat},
    error::GatewayError,
    listener::InboundListener,
    notify::Notifier,
    prompts::TerminalPrompts,
    relay::MessageRelay,
    state::AppState,
    storage::{EncryptedStorage, StoragePaths},
    transport::{SignalRestClient, Transport},
    volume::{LuksVolume, NoopVolume, VolumeManager},
};

/// Time given to in-flight requests after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(version, about = "Encrypted-volume backed secure messaging gateway")]
struct Args {
    /// Register a number with the messaging transport, then exit.
    #[arg(short, long)]
    register: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Gateway stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &GatewayConfig) {
    let transport_level = if config.debug { "debug" } else { "error" };
    let default_filter = format!(
        "info,tower_http=debug,secure_messaging_gateway::transport={transport_level}"
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run(args: Args, config: GatewayConfig) -> Result<(), GatewayError> {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    let volume: Box<dyn VolumeManager> = if config.volume_test_mode {
        Box::new(NoopVolume)
    } else {
        Box::new(LuksVolume::new(&config.volume_device_dir, &config.data_dir))
    };
    let transport: Arc<dyn Transport> = Arc::new(SignalRestClient::new(
        &config.transport_url,
        config.poll_interval,
    )?);
    let storage = EncryptedStorage::new(StoragePaths::new(&config.data_dir, &config.key_path));
    let prompts = TerminalPrompts;

    let mode = if args.register {
        ActivationMode::Register
    } else {
        ActivationMode::Steady
    };
    let mut activator = Activator::new(
        storage,
        volume.as_ref(),
        &prompts,
        transport.as_ref(),
        ActivationSettings {
            verification: config.verification,
            verbose: config.debug,
        },
    );

    match activator.run(mode).await? {
        Activation::RegistrationComplete { number } => {
            if let Err(e) = volume.lock() {
                warn!(error = %e, "Failed to lock encrypted volume");
            }
            info!(number = %number, "Registration complete, restart without --register");
            return Ok(());
        }
        Activation::Ready { number } => {
            info!(number = %number, "Messaging transport ready");
        }
    }

    let relay = Arc::new(MessageRelay::new(
        Arc::new(activator.storage().clone()),
        transport.clone(),
        Notifier::new(config.notification_ttl),
        config.history_limit,
    ));
    let listener = InboundListener::new(transport.clone(), relay.clone());
    let state = AppState::new(relay, listener.status());
    let listener = listener.spawn();
    activator.listener_started();

    let app = router(state);
    let handle = Handle::new();
    let signal_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    let served = match &config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(GatewayError::Server)?;
            info!(addr = %config.bind_addr, "Gateway listening on https (docs at /docs)");
            axum_server::bind_rustls(config.bind_addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            info!(addr = %config.bind_addr, "Gateway listening on http (docs at /docs)");
            axum_server::bind(config.bind_addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    listener.shutdown().await;
    served.map_err(GatewayError::Server)
}

/// Resolves on Ctrl-C. Never resolves if the signal cannot be installed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
