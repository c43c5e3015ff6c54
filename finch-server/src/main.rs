use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use finch_capture::CaptureController;
use finch_gpio::{GpioCoprocessor, MockCoprocessor, Sequencer};
use finch_server::{
    build_router, config, AppError, AppState, CameraBackendKind, Coordinator, FinchConfig,
    GpioBackendKind, NoopDisplay,
};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Optical instrument coordinator: GPIO illumination sequencer + camera capture server")]
struct CliArgs {
    /// Path to a TOML config file. Missing file falls back to built-in defaults.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Override the listen address from the config file.
    #[arg(long)]
    listen_addr: Option<String>,
}

fn load_config(args: &CliArgs) -> Result<FinchConfig, AppError> {
    let mut cfg = match &args.config {
        Some(path) => config::parse_config_file(path)?,
        None => FinchConfig::default(),
    };
    if let Some(addr) = &args.listen_addr {
        cfg.listen_addr = addr.clone();
    }
    Ok(cfg)
}

fn build_gpio_coprocessor(cfg: &FinchConfig) -> Result<Box<dyn GpioCoprocessor>, AppError> {
    match cfg.gpio_backend {
        GpioBackendKind::Mock => Ok(Box::new(MockCoprocessor::new())),
        GpioBackendKind::PigpioSocket => {
            #[cfg(feature = "pigpio-socket")]
            {
                let socket = finch_gpio::PigpioSocket::connect(&cfg.pigpio_addr)
                    .map_err(|e| AppError::HardwareUnavailable(e.to_string()))?;
                Ok(Box::new(socket))
            }
            #[cfg(not(feature = "pigpio-socket"))]
            {
                Err(AppError::HardwareUnavailable(
                    "pigpio-socket backend selected but the binary was built without the \
                     pigpio-socket feature"
                        .to_string(),
                ))
            }
        }
    }
}

fn build_camera_backend(
    cfg: &FinchConfig,
) -> Result<Box<dyn finch_capture::CameraBackend>, AppError> {
    match cfg.camera_backend {
        CameraBackendKind::Mock => Ok(Box::new(finch_capture::backends::mock::MockBackend::new(
            640, 480,
        ))),
        CameraBackendKind::V4l2 => {
            #[cfg(feature = "backend-v4l2")]
            {
                Ok(Box::new(finch_capture::backends::v4l2::V4l2Backend::new(
                    cfg.v4l2_device.clone(),
                    640,
                    480,
                )))
            }
            #[cfg(not(feature = "backend-v4l2"))]
            {
                Err(AppError::HardwareUnavailable(
                    "v4l2 backend selected but the binary was built without the backend-v4l2 \
                     feature"
                        .to_string(),
                ))
            }
        }
    }
}

async fn run(cfg: FinchConfig) -> Result<(), AppError> {
    let coprocessor = build_gpio_coprocessor(&cfg)?;
    let mut sequencer = Sequencer::new(coprocessor, cfg.trigger);
    sequencer
        .start()
        .map_err(|e| AppError::HardwareUnavailable(e.to_string()))?;

    let camera_backend = build_camera_backend(&cfg)?;
    let capture = CaptureController::new(camera_backend, cfg.jpeg_quality);

    let display = Box::new(NoopDisplay::default());
    let coordinator = Arc::new(Coordinator::new(sequencer, capture, display, cfg.sweep));
    coordinator.open_capture()?;

    let ticker_coordinator = coordinator.clone();
    let ticker = tokio::spawn(async move {
        loop {
            ticker_coordinator.tick();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    info!("finch-server listening on {}", cfg.listen_addr);
    let router = build_router(
        AppState {
            coordinator: coordinator.clone(),
        },
        cfg.static_dir.clone(),
    );

    let serve = {
        use std::future::IntoFuture;
        axum::serve(listener, router).into_future()
    };

    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!("http server exited with an error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Ordered, failure-tolerant shutdown: stop the ticker before the
    // components it drives, then the hardware that depends on them.
    ticker.abort();
    coordinator.shutdown();
    if let Err(e) = ticker.await {
        if !e.is_cancelled() {
            warn!("ticker task panicked during shutdown: {e}");
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let _guard = env_tracing_logger::init();
    let args = CliArgs::parse();
    let cfg = load_config(&args)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("finch-server-runtime")
        .build()?;

    runtime.block_on(run(cfg))?;
    Ok(())
}
