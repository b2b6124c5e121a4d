//! Language server binary for Karate test execution.
//!
//! This binary hosts the Karate test explorer backend: it discovers feature
//! files, keeps the test tree current and drives runner processes on behalf
//! of an editor. It communicates via JSON-RPC over stdin/stdout.

use std::ops::ControlFlow;

use async_lsp::concurrency::ConcurrencyLayer;
use async_lsp::panic::CatchUnwindLayer;
use async_lsp::router::Router;
use async_lsp::server::LifecycleLayer;
use async_lsp::tracing::TracingLayer;
use clap::Parser;
use lsp_types::{notification, request};
use tower::ServiceBuilder;
use tracing::info;

use karate_ide_server::config::{LogLevel, ServerConfig};
use karate_ide_server::error::ServerError;
use karate_ide_server::handlers::{
    CancelBusy, ReparseFeature, handle_cancel, handle_cancel_busy, handle_did_change_text_document,
    handle_did_change_watched_files, handle_did_close_text_document, handle_did_save_text_document,
    handle_initialise, handle_initialised, handle_process_message, handle_reparse_feature,
    handle_run_tests, handle_shutdown, handle_test_tree,
};
use karate_ide_server::logging::init_logging;
use karate_ide_server::lsp_ext::{CancelRun, GetTestTree, RunTests};
use karate_ide_server::server::ServerState;
use karate_ide_server::supervisor::ProcessMessage;

/// Test explorer and execution backend for Karate feature files.
#[derive(Parser, Debug)]
#[command(name = "karate-ide-lsp", version, about)]
struct Args {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<LogLevel>,

    /// Keep a persistent Karate test server alive between runs.
    #[arg(long)]
    use_test_server: Option<bool>,
}

fn main() {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            let fallback = ServerConfig::default();
            init_logging(&fallback);
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        test_server = config.use_test_server,
        "starting karate-ide-lsp"
    );

    let result = run_server(config);
    if let Err(e) = result {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}

/// Run the language server.
fn run_server(config: ServerConfig) -> std::io::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run_server_async(config))
}

fn build_config(args: &Args) -> Result<ServerConfig, ServerError> {
    let config = ServerConfig::from_env()?;
    Ok(config.apply_overrides(args.log_level, args.use_test_server))
}

/// Asynchronously run the language server main loop.
async fn run_server_async(config: ServerConfig) -> std::io::Result<()> {
    let (server, _client) = async_lsp::MainLoop::new_server(|client| {
        let state = ServerState::new(config.clone(), client);

        let mut router = Router::new(state);
        router
            .request::<request::Initialize, _>(|st, params| {
                let result = handle_initialise(st, params);
                std::future::ready(result)
            })
            .request::<request::Shutdown, _>(|st, _params| {
                let result = handle_shutdown(st);
                std::future::ready(result)
            })
            .request::<RunTests, _>(|st, params| {
                let result = handle_run_tests(st, params);
                std::future::ready(result)
            })
            .request::<CancelRun, _>(|st, _params| {
                let result = handle_cancel(st);
                std::future::ready(result)
            })
            .request::<GetTestTree, _>(|st, _params| {
                let result = handle_test_tree(st);
                std::future::ready(result)
            })
            .notification::<notification::Initialized>(|st, params| {
                handle_initialised(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::Exit>(|_, ()| ControlFlow::Break(Ok(())))
            .notification::<notification::DidOpenTextDocument>(|_, _| ControlFlow::Continue(()))
            .notification::<notification::DidChangeTextDocument>(|st, params| {
                handle_did_change_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidSaveTextDocument>(|st, params| {
                handle_did_save_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidCloseTextDocument>(|st, params| {
                handle_did_close_text_document(st, params);
                ControlFlow::Continue(())
            })
            .notification::<notification::DidChangeWatchedFiles>(|st, params| {
                handle_did_change_watched_files(st, params);
                ControlFlow::Continue(())
            })
            .event::<ProcessMessage>(|st, message| {
                handle_process_message(st, message);
                ControlFlow::Continue(())
            })
            .event::<ReparseFeature>(|st, event| {
                handle_reparse_feature(st, event);
                ControlFlow::Continue(())
            })
            .event::<CancelBusy>(|st, event| {
                handle_cancel_busy(st, event);
                ControlFlow::Continue(())
            });

        ServiceBuilder::new()
            .layer(TracingLayer::default())
            .layer(LifecycleLayer::default())
            .layer(CatchUnwindLayer::default())
            .layer(ConcurrencyLayer::default())
            .service(router)
    });

    // Use platform-appropriate stdio with tokio integration
    #[cfg(unix)]
    let (stdin, stdout) = (
        async_lsp::stdio::PipeStdin::lock_tokio()?,
        async_lsp::stdio::PipeStdout::lock_tokio()?,
    );
    #[cfg(not(unix))]
    let (stdin, stdout) = {
        use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};
        (
            tokio::io::stdin().compat(),
            tokio::io::stdout().compat_write(),
        )
    };

    server
        .run_buffered(stdin, stdout)
        .await
        .map_err(std::io::Error::other)?;

    info!("server exited");
    Ok(())
}
