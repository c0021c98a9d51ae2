//! Printer subsystems.
//!
//! Every component wraps the routes and limits of one descriptor category.
//! Getters return a [`Reply`] so they can be used directly as data logger
//! producers; setters validate against the declared limits before issuing a
//! `PUT` and fail without touching the network when the value is rejected.

use std::sync::Arc;

use chrono::Local;
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use super::state::JobTarget;
use crate::client::{
    DeviceClient, FormPart, Reply, RequestBody, ReqwestTransport, Transport, APPLICATION_JSON,
};
use crate::endpoint::{CategoryLimits, CategoryRoutes, EndpointTables};
use crate::error::{ControlError, ControlResult};

const ACCEPT_JSON: [(&str, &str); 1] = [("Accept", APPLICATION_JSON)];

/// Routes and limits of one category, plus the client to reach them.
pub(crate) struct Endpoints<T: Transport> {
    client: Arc<DeviceClient<T>>,
    category: String,
    routes: CategoryRoutes,
    limits: CategoryLimits,
}

impl<T: Transport> Clone for Endpoints<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            category: self.category.clone(),
            routes: self.routes.clone(),
            limits: self.limits.clone(),
        }
    }
}

impl<T: Transport> Endpoints<T> {
    /// A category missing from the tables yields a component whose calls fail
    /// with [`ControlError::UnknownEndpoint`].
    pub(crate) fn new(client: Arc<DeviceClient<T>>, tables: &EndpointTables, category: &str) -> Self {
        Self {
            client,
            category: category.to_string(),
            routes: tables.routes.category(category).cloned().unwrap_or_default(),
            limits: tables.limits.category(category).cloned().unwrap_or_default(),
        }
    }

    fn url(&self, label: &str) -> ControlResult<&str> {
        self.routes
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| ControlError::UnknownEndpoint {
                category: self.category.clone(),
                label: label.to_string(),
            })
    }

    /// Labels without a declared limit accept any value.
    fn check(&self, label: &str, value: &Value) -> ControlResult<()> {
        match self.limits.get(label) {
            Some(limit) => {
                limit.validate(value)?;
                Ok(())
            }
            None => {
                trace!(category = %self.category, label, "No limit declared");
                Ok(())
            }
        }
    }

    fn read(&self, label: &str) -> ControlResult<Reply> {
        self.client.get(self.url(label)?, &ACCEPT_JSON)
    }

    fn write(&self, label: &str, body: Value) -> ControlResult<()> {
        let url = self.url(label)?;
        debug!(category = %self.category, label, body = %body, "Writing setting");
        self.client
            .put(url, RequestBody::Json(body), &ACCEPT_JSON)
            .map(|_| ())
    }

    /// Validates `value` against `limit_label` and writes it to `label`.
    fn set(&self, label: &str, limit_label: &str, value: Value) -> ControlResult<()> {
        self.check(limit_label, &value)?;
        self.write(label, value)
    }

    /// Validates each present axis and writes them as one object.
    fn set_axes(&self, label: &str, axes: &[(&str, &str, Option<f64>)]) -> ControlResult<()> {
        let mut body = Map::new();
        for (axis, limit_label, value) in axes {
            if let Some(value) = value {
                let value = json!(value);
                self.check(limit_label, &value)?;
                body.insert(axis.to_string(), value);
            }
        }
        self.write(label, Value::Object(body))
    }
}

macro_rules! component {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<T: Transport = ReqwestTransport> {
            endpoints: Endpoints<T>,
        }

        impl<T: Transport> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    endpoints: self.endpoints.clone(),
                }
            }
        }

        impl<T: Transport> $name<T> {
            pub(crate) fn new(endpoints: Endpoints<T>) -> Self {
                Self { endpoints }
            }
        }
    };
}

component!(
    /// Job control and printer-wide status.
    System
);
component!(
    /// Heated build plate and its Z axis.
    Bed
);
component!(
    /// Print head X/Y motion.
    Head
);
component!(
    /// One hotend.
    Nozzle
);
component!(
    /// One material feeder.
    Feeder
);
component!(
    /// Case lighting.
    Led
);
component!(
    /// Print head cooling fan.
    Fan
);
component!(
    /// Sensors outside the print head and bed.
    Peripherals
);

impl<T: Transport> System<T> {
    /// Uploads a print job as a multipart form.
    pub fn start_job(&self, file_name: &str, bytes: Vec<u8>) -> ControlResult<Value> {
        let url = self.endpoints.url("job")?;
        let job_name = Local::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string();
        let parts = vec![
            FormPart::text("job_name", job_name),
            FormPart::file("file", file_name, bytes),
        ];
        self.endpoints
            .client
            .post(url, RequestBody::Multipart(parts), &ACCEPT_JSON)
    }

    pub fn set_job_state(&self, target: JobTarget) -> ControlResult<()> {
        let value = json!(target.as_str());
        self.endpoints.check("state", &value)?;
        self.endpoints.write("state", json!({ "target": value }))
    }

    pub fn printer_status(&self) -> ControlResult<Reply> {
        self.endpoints.read("status")
    }

    pub fn job_state(&self) -> ControlResult<Reply> {
        self.endpoints.read("state")
    }

    /// Checks the configured credentials.
    pub fn verify(&self) -> ControlResult<Reply> {
        self.endpoints.read("verify")
    }
}

impl<T: Transport> Bed<T> {
    pub fn heat_to(&self, celsius: f64) -> ControlResult<()> {
        self.endpoints.set("tgt_temp", "tgt_temp", json!(celsius))
    }

    /// Preheats the bed, optionally for `timeout` seconds.
    pub fn preheat_to(&self, celsius: f64, timeout: Option<f64>) -> ControlResult<()> {
        self.endpoints.check("pre_temp", &json!(celsius))?;
        self.endpoints.write(
            "pre_temp",
            json!({ "temperature": celsius, "timeout": timeout }),
        )
    }

    pub fn move_to(&self, z: f64) -> ControlResult<()> {
        self.endpoints.set_axes("pos", &[("z", "pos_z", Some(z))])
    }

    pub fn limit_speed_to(&self, z: f64) -> ControlResult<()> {
        self.endpoints.set_axes("speed", &[("z", "speed_z", Some(z))])
    }

    pub fn set_jerk_to(&self, z: f64) -> ControlResult<()> {
        self.endpoints.set_axes("jerk", &[("z", "jerk_z", Some(z))])
    }

    pub fn temperature(&self) -> ControlResult<Reply> {
        self.endpoints.read("cur_temp")
    }

    pub fn target_temperature(&self) -> ControlResult<Reply> {
        self.endpoints.read("tgt_temp")
    }

    pub fn position(&self) -> ControlResult<Reply> {
        self.endpoints.read("pos_z")
    }
}

impl<T: Transport> Head<T> {
    /// Moves along the given axes; `None` leaves an axis where it is.
    pub fn move_to(&self, x: Option<f64>, y: Option<f64>) -> ControlResult<()> {
        self.endpoints
            .set_axes("pos", &[("x", "pos_x", x), ("y", "pos_y", y)])
    }

    pub fn limit_speed_to(&self, x: Option<f64>, y: Option<f64>) -> ControlResult<()> {
        self.endpoints
            .set_axes("speed", &[("x", "speed_x", x), ("y", "speed_y", y)])
    }

    pub fn set_acceleration_to(&self, value: f64) -> ControlResult<()> {
        self.endpoints.set("accel", "accel", json!(value))
    }

    pub fn set_jerk_to(&self, x: Option<f64>, y: Option<f64>) -> ControlResult<()> {
        self.endpoints
            .set_axes("jerk", &[("x", "jerk_x", x), ("y", "jerk_y", y)])
    }

    pub fn position_x(&self) -> ControlResult<Reply> {
        self.endpoints.read("pos_x")
    }

    pub fn position_y(&self) -> ControlResult<Reply> {
        self.endpoints.read("pos_y")
    }

    pub fn max_speed_x(&self) -> ControlResult<Reply> {
        self.endpoints.read("speed_x")
    }

    pub fn max_speed_y(&self) -> ControlResult<Reply> {
        self.endpoints.read("speed_y")
    }

    pub fn acceleration(&self) -> ControlResult<Reply> {
        self.endpoints.read("accel")
    }

    pub fn jerk_x(&self) -> ControlResult<Reply> {
        self.endpoints.read("jerk_x")
    }

    pub fn jerk_y(&self) -> ControlResult<Reply> {
        self.endpoints.read("jerk_y")
    }
}

impl<T: Transport> Nozzle<T> {
    pub fn heat_to(&self, celsius: f64) -> ControlResult<()> {
        self.endpoints.set("tgt_temp", "tgt_temp", json!(celsius))
    }

    pub fn temperature(&self) -> ControlResult<Reply> {
        self.endpoints.read("cur_temp")
    }

    pub fn target_temperature(&self) -> ControlResult<Reply> {
        self.endpoints.read("tgt_temp")
    }
}

impl<T: Transport> Feeder<T> {
    pub fn limit_speed_to(&self, value: f64) -> ControlResult<()> {
        self.endpoints.set("speed", "speed", json!(value))
    }

    pub fn set_acceleration_to(&self, value: f64) -> ControlResult<()> {
        self.endpoints.set("accel", "accel", json!(value))
    }

    pub fn set_jerk_to(&self, value: f64) -> ControlResult<()> {
        self.endpoints.set("jerk", "jerk", json!(value))
    }

    pub fn max_speed(&self) -> ControlResult<Reply> {
        self.endpoints.read("speed")
    }

    pub fn acceleration(&self) -> ControlResult<Reply> {
        self.endpoints.read("accel")
    }

    pub fn jerk(&self) -> ControlResult<Reply> {
        self.endpoints.read("jerk")
    }
}

impl<T: Transport> Led<T> {
    /// Brightness in percent.
    pub fn set_brightness_to(&self, percent: f64) -> ControlResult<()> {
        self.endpoints.set("brightness", "brightness", json!(percent))
    }

    pub fn brightness(&self) -> ControlResult<Reply> {
        self.endpoints.read("brightness")
    }
}

impl<T: Transport> Fan<T> {
    pub fn speed(&self) -> ControlResult<Reply> {
        self.endpoints.read("speed")
    }
}

impl<T: Transport> Peripherals<T> {
    pub fn ambient_temperature(&self) -> ControlResult<Reply> {
        self.endpoints.read("amb_temp")
    }
}
