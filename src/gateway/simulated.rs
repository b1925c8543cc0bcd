//! Simulated actors for running missions without hardware.
//!
//! Each actor sleeps for a fixed latency and then answers the way the real
//! service would. Switch-style devices are idempotent: stopping a device that
//! is already off still succeeds.

use super::{
    AsyncServiceGateway, CoverageMonitorConfig, EndpointId, ServiceHandler, ServiceRequest, ServiceResponse,
};
use crate::common::Pose2D;
use crate::error::GatewayError;
use crate::perception::RoomMask;
use async_trait::async_trait;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

fn unexpected(endpoint: EndpointId, request: &ServiceRequest) -> GatewayError {
    GatewayError::Rejected(endpoint, format!("unexpected request {request:?}"))
}

fn trigger(success: bool, message: impl Into<String>) -> ServiceResponse {
    ServiceResponse::Trigger {
        success,
        message: message.into(),
    }
}

/// Motion control, trolley and tool changer: every action completes
pub struct SimulatedActuator {
    latency: Duration,
}

impl SimulatedActuator {
    pub fn new(latency: Duration) -> Self {
        SimulatedActuator { latency }
    }
}

#[async_trait]
impl ServiceHandler for SimulatedActuator {
    async fn handle(&self, endpoint: EndpointId, request: ServiceRequest) -> Result<ServiceResponse, GatewayError> {
        tokio::time::sleep(self.latency).await;
        match request {
            ServiceRequest::MoveToPose { .. }
            | ServiceRequest::FollowPath { .. }
            | ServiceRequest::FollowWall { .. }
            | ServiceRequest::MoveTrolley { .. }
            | ServiceRequest::ChangeTool { .. } => {
                debug!(%endpoint, "action completed");
                Ok(ServiceResponse::Done)
            }
            other => Err(unexpected(endpoint, &other)),
        }
    }
}

/// Coverage planner sweeping the room mask row by row
pub struct SimulatedPlanner {
    latency: Duration,
}

impl SimulatedPlanner {
    pub fn new(latency: Duration) -> Self {
        SimulatedPlanner { latency }
    }

    /// Alternating-direction sweep through every foreground cell
    pub fn sweep(mask: &RoomMask, resolution: f64, origin: &Pose2D) -> Vec<Pose2D> {
        let mut path = Vec::with_capacity(mask.foreground_count());
        for y in 0..mask.height {
            let reversed = y % 2 == 1;
            let theta = if reversed { PI } else { 0.0 };
            let xs: Vec<usize> = if reversed {
                (0..mask.width).rev().collect()
            } else {
                (0..mask.width).collect()
            };
            for x in xs.into_iter().filter(|&x| mask.is_set(x, y)) {
                let center = mask.cell_center(x, y, resolution, origin);
                path.push(Pose2D::new(center.x, center.y, theta));
            }
        }
        path
    }
}

#[async_trait]
impl ServiceHandler for SimulatedPlanner {
    async fn handle(&self, endpoint: EndpointId, request: ServiceRequest) -> Result<ServiceResponse, GatewayError> {
        tokio::time::sleep(self.latency).await;
        let path = match &request {
            ServiceRequest::ExploreRoom {
                mask,
                resolution,
                origin,
                ..
            } => Self::sweep(mask, *resolution, origin),
            other => return Err(unexpected(endpoint, other)),
        };
        info!(poses = path.len(), "planned coverage path");
        Ok(ServiceResponse::CoveragePath((!path.is_empty()).then_some(path)))
    }
}

/// A device with an on/off state, such as the cleaning brush
pub struct SimulatedSwitch {
    name: &'static str,
    latency: Duration,
    on: AtomicBool,
}

impl SimulatedSwitch {
    pub fn new(name: &'static str, latency: Duration) -> Self {
        SimulatedSwitch {
            name,
            latency,
            on: AtomicBool::new(false),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    fn toggle(&self, on: bool) -> ServiceResponse {
        let was_on = self.on.swap(on, Ordering::SeqCst);
        if was_on == on {
            trigger(true, format!("{} already {}", self.name, if on { "on" } else { "off" }))
        } else {
            info!(device = self.name, on, "device switched");
            trigger(true, "")
        }
    }
}

#[async_trait]
impl ServiceHandler for SimulatedSwitch {
    async fn handle(&self, endpoint: EndpointId, request: ServiceRequest) -> Result<ServiceResponse, GatewayError> {
        tokio::time::sleep(self.latency).await;
        match (endpoint, request) {
            (EndpointId::StartCleaningDevice | EndpointId::StartCoverageMonitoring, ServiceRequest::Trigger) => {
                Ok(self.toggle(true))
            }
            (EndpointId::StopCleaningDevice | EndpointId::StopCoverageMonitoring, ServiceRequest::Trigger) => {
                Ok(self.toggle(false))
            }
            (endpoint, other) => Err(unexpected(endpoint, &other)),
        }
    }
}

/// Coverage monitor: a switch plus its configuration and the coverage map
pub struct SimulatedCoverageMonitor {
    switch: SimulatedSwitch,
    config: Mutex<Option<CoverageMonitorConfig>>,
}

impl SimulatedCoverageMonitor {
    pub fn new(latency: Duration) -> Self {
        SimulatedCoverageMonitor {
            switch: SimulatedSwitch::new("coverage_monitor", latency),
            config: Mutex::new(None),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.switch.is_on()
    }
}

#[async_trait]
impl ServiceHandler for SimulatedCoverageMonitor {
    async fn handle(&self, endpoint: EndpointId, request: ServiceRequest) -> Result<ServiceResponse, GatewayError> {
        match request {
            ServiceRequest::PushCoverageConfig(config) => {
                tokio::time::sleep(self.switch.latency).await;
                debug!(map_frame = %config.map_frame, robot_frame = %config.robot_frame, "coverage monitor configured");
                *self.config.lock().await = Some(config);
                Ok(ServiceResponse::Done)
            }
            ServiceRequest::GetCoverageMap { area_mask, .. } => {
                tokio::time::sleep(self.switch.latency).await;
                let recorded = self
                    .config
                    .lock()
                    .await
                    .as_ref()
                    .is_some_and(|config| config.recording_active);
                // Everything the robot swept is reported as seen once recording ran
                let map = if recorded {
                    area_mask
                } else {
                    RoomMask::empty(area_mask.width, area_mask.height)
                };
                Ok(ServiceResponse::CoverageMap(map))
            }
            other => self.switch.handle(endpoint, other).await,
        }
    }
}

/// Register simulated actors for every endpoint
pub fn register_simulated_robot(gateway: &mut AsyncServiceGateway, latency: Duration) {
    let actuator: Arc<dyn ServiceHandler> = Arc::new(SimulatedActuator::new(latency));
    for endpoint in [
        EndpointId::MoveToPose,
        EndpointId::FollowPath,
        EndpointId::FollowWall,
        EndpointId::MoveTrolley,
        EndpointId::ChangeTool,
    ] {
        gateway.register_endpoint(endpoint, actuator.clone());
    }

    gateway.register_endpoint(EndpointId::ExploreRoom, Arc::new(SimulatedPlanner::new(latency)));

    let brush: Arc<dyn ServiceHandler> = Arc::new(SimulatedSwitch::new("cleaning_device", latency));
    gateway.register_endpoint(EndpointId::StartCleaningDevice, brush.clone());
    gateway.register_endpoint(EndpointId::StopCleaningDevice, brush);

    let monitor: Arc<dyn ServiceHandler> = Arc::new(SimulatedCoverageMonitor::new(latency));
    for endpoint in [
        EndpointId::StartCoverageMonitoring,
        EndpointId::StopCoverageMonitoring,
        EndpointId::PushCoverageConfig,
        EndpointId::GetCoverageMap,
    ] {
        gateway.register_endpoint(endpoint, monitor.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{EndpointMap, ServiceGateway};
    use tokio::runtime::Builder;

    #[test]
    fn sweep_alternates_direction() {
        let mut mask = RoomMask::empty(3, 2);
        for x in 0..3 {
            mask.set(x, 0);
            mask.set(x, 1);
        }
        let path = SimulatedPlanner::sweep(&mask, 1.0, &Pose2D::new(0.0, 0.0, 0.0));

        let xs: Vec<f64> = path.iter().map(|p| p.position.x).collect();
        assert_eq!(xs, vec![0.5, 1.5, 2.5, 2.5, 1.5, 0.5]);
        assert_eq!(path[3].theta, PI);
    }

    #[tokio::test]
    async fn empty_mask_has_no_path() {
        let planner = SimulatedPlanner::new(Duration::ZERO);
        let request = ServiceRequest::ExploreRoom {
            mask: RoomMask::empty(4, 4),
            resolution: 0.05,
            origin: Pose2D::new(0.0, 0.0, 0.0),
            robot_radius: 0.3,
            coverage_radius: 0.25,
            field_of_view: crate::common::FieldOfView::new([(0.0, 0.1), (0.0, -0.1), (0.2, -0.1), (0.2, 0.1)]),
            starting_pose: Pose2D::new(0.0, 0.0, 0.0),
            planning_mode: 2,
        };
        let response = planner.handle(EndpointId::ExploreRoom, request).await.unwrap();
        assert_eq!(response, ServiceResponse::CoveragePath(None));
    }

    #[tokio::test]
    async fn stopping_twice_succeeds() {
        let switch = SimulatedSwitch::new("cleaning_device", Duration::ZERO);
        for endpoint in [EndpointId::StartCleaningDevice, EndpointId::StopCleaningDevice, EndpointId::StopCleaningDevice] {
            let response = switch.handle(endpoint, ServiceRequest::Trigger).await.unwrap();
            assert!(matches!(response, ServiceResponse::Trigger { success: true, .. }));
        }
        assert!(!switch.is_on());
    }

    #[test]
    fn simulated_robot_serves_every_endpoint() {
        let rt = Builder::new_multi_thread().worker_threads(1).enable_all().build().unwrap();
        let mut gateway = AsyncServiceGateway::new(rt.handle().clone(), EndpointMap::default());
        register_simulated_robot(&mut gateway, Duration::ZERO);

        let response = gateway
            .call(EndpointId::StopCoverageMonitoring, ServiceRequest::Trigger, Duration::from_secs(1))
            .unwrap();
        assert!(matches!(response, ServiceResponse::Trigger { success: true, .. }));
        let response = gateway
            .call(EndpointId::MoveTrolley, ServiceRequest::MoveTrolley { checkpoint: 2 }, Duration::from_secs(1))
            .unwrap();
        assert_eq!(response, ServiceResponse::Done);
    }
}
