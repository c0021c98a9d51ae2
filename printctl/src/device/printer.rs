//! Printer facade.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::component::{Bed, Endpoints, Fan, Feeder, Head, Led, Nozzle, Peripherals, System};
use super::state::{JobTarget, PrinterStatus, JOB_STATE_NONE};
use crate::client::{DeviceClient, Reply, ReqwestTransport, Transport};
use crate::config::DeviceConfig;
use crate::datalog::{DataLogger, LoggerConfig, Producer, SnapshotSink};
use crate::endpoint::{compile_model, EndpointTables, BUNDLED_DESCRIPTOR};
use crate::error::{ControlError, ControlResult};

/// Model name of the bundled Ultimaker S3 descriptor.
pub const MODEL_S3: &str = "s3";

/// One networked printer and its subsystems.
pub struct Printer<T: Transport + 'static = ReqwestTransport> {
    client: Arc<DeviceClient<T>>,
    logger_config: LoggerConfig,
    system: System<T>,
    bed: Bed<T>,
    head: Head<T>,
    led: Led<T>,
    fan: Fan<T>,
    peripherals: Peripherals<T>,
    main_nozzle: Nozzle<T>,
    sub_nozzle: Nozzle<T>,
    main_feeder: Feeder<T>,
    sub_feeder: Feeder<T>,
}

impl<T: Transport + 'static> Clone for Printer<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            logger_config: self.logger_config,
            system: self.system.clone(),
            bed: self.bed.clone(),
            head: self.head.clone(),
            led: self.led.clone(),
            fan: self.fan.clone(),
            peripherals: self.peripherals.clone(),
            main_nozzle: self.main_nozzle.clone(),
            sub_nozzle: self.sub_nozzle.clone(),
            main_feeder: self.main_feeder.clone(),
            sub_feeder: self.sub_feeder.clone(),
        }
    }
}

impl Printer<ReqwestTransport> {
    /// Connects to the device described by `config` using the bundled
    /// descriptor for `model`.
    pub fn connect(config: &DeviceConfig, model: &str) -> ControlResult<Self> {
        let tables = compile_model(BUNDLED_DESCRIPTOR, model, &config.base_url())?;
        let client = DeviceClient::connect(config.request_timeout, config.credentials())?;
        info!(
            device = %config.name,
            address = %config.ip_address,
            model,
            endpoints = tables.routes.len(),
            "Printer configured"
        );
        Ok(Self::new(Arc::new(client), &tables).with_logger_config(config.logger_config()))
    }
}

impl<T: Transport + 'static> Printer<T> {
    pub fn new(client: Arc<DeviceClient<T>>, tables: &EndpointTables) -> Self {
        let endpoints = |category: &str| Endpoints::new(Arc::clone(&client), tables, category);
        Self {
            system: System::new(endpoints("system")),
            bed: Bed::new(endpoints("bed")),
            head: Head::new(endpoints("head")),
            led: Led::new(endpoints("led")),
            fan: Fan::new(endpoints("fan")),
            peripherals: Peripherals::new(endpoints("periph")),
            main_nozzle: Nozzle::new(endpoints("nozzle1")),
            sub_nozzle: Nozzle::new(endpoints("nozzle2")),
            main_feeder: Feeder::new(endpoints("feeder1")),
            sub_feeder: Feeder::new(endpoints("feeder2")),
            logger_config: LoggerConfig::default(),
            client,
        }
    }

    /// Timing used by loggers created through [`Printer::data_logger`].
    pub fn with_logger_config(mut self, config: LoggerConfig) -> Self {
        self.logger_config = config;
        self
    }

    pub fn client(&self) -> &Arc<DeviceClient<T>> {
        &self.client
    }

    pub fn system(&self) -> &System<T> {
        &self.system
    }

    pub fn bed(&self) -> &Bed<T> {
        &self.bed
    }

    pub fn head(&self) -> &Head<T> {
        &self.head
    }

    pub fn led(&self) -> &Led<T> {
        &self.led
    }

    pub fn fan(&self) -> &Fan<T> {
        &self.fan
    }

    pub fn peripherals(&self) -> &Peripherals<T> {
        &self.peripherals
    }

    pub fn main_nozzle(&self) -> &Nozzle<T> {
        &self.main_nozzle
    }

    pub fn sub_nozzle(&self) -> &Nozzle<T> {
        &self.sub_nozzle
    }

    pub fn main_feeder(&self) -> &Feeder<T> {
        &self.main_feeder
    }

    pub fn sub_feeder(&self) -> &Feeder<T> {
        &self.sub_feeder
    }

    pub fn status(&self) -> ControlResult<Reply> {
        self.system.printer_status()
    }

    /// Current job state. A rejected request (e.g. no active job) reads as
    /// `"none"`, also when the reply is deferred by a batch. Connection
    /// failures are still returned as errors.
    pub fn job_state(&self) -> ControlResult<Reply> {
        let none = Value::from(JOB_STATE_NONE);
        match self.system.job_state() {
            Ok(reply) => Ok(reply.or_when_rejected(none)),
            Err(ControlError::Request { .. }) => Ok(Reply::Ready(none)),
            Err(e) => Err(e),
        }
    }

    /// Whether the configured credentials are accepted by the device.
    pub fn is_accessible(&self) -> ControlResult<bool> {
        match self.system.verify().and_then(Reply::into_value) {
            Ok(_) => Ok(true),
            Err(ControlError::Request { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn pause(&self) -> ControlResult<()> {
        self.system.set_job_state(JobTarget::Pause)
    }

    pub fn resume(&self) -> ControlResult<()> {
        self.system.set_job_state(JobTarget::Print)
    }

    pub fn abort(&self) -> ControlResult<()> {
        self.system.set_job_state(JobTarget::Abort)
    }

    /// Uploads and starts the print job at `path`.
    ///
    /// When the printer is not idle the job is skipped with a warning and
    /// `Ok(false)` is returned.
    pub fn print(&self, path: &Path) -> ControlResult<bool> {
        let status = self.status()?.into_value()?;
        let status = PrinterStatus::parse(status.as_str().unwrap_or_default());
        if status != PrinterStatus::Idle {
            warn!(
                status = %status,
                file = %path.display(),
                "The new job is ignored because the printer is still working"
            );
            return Ok(false);
        }

        let bytes = std::fs::read(path).map_err(|e| ControlError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "job.ufp".to_string());

        info!(file = %file_name, bytes = bytes.len(), "Starting print job");
        self.system.start_job(&file_name, bytes)?;
        Ok(true)
    }

    /// Creates a data logger over this printer's client with `producers`
    /// registered. The logger is not started.
    pub fn data_logger<S, I, N>(&self, sink: S, producers: I) -> DataLogger<T>
    where
        S: SnapshotSink + 'static,
        I: IntoIterator<Item = (N, Producer)>,
        N: Into<String>,
    {
        let logger = DataLogger::new(Arc::clone(&self.client), sink, self.logger_config);
        logger.register(producers);
        logger
    }
}
