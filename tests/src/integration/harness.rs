//! Full relay over one in-memory bus: gateway (HTTP disabled) plus ingestion
//! worker plus an in-memory store.

use axum::Router;
use hl_01_api_gateway::{ApiGatewayService, Correlator, GatewayConfig, GatewayResult};
use hl_02_patient_ingestion::{
    FlushReport, InMemoryPatientStore, IngestionConfig, IngestionError, IngestionService,
    IngestionWorker, PatientStore,
};
use shared_bus::{InMemoryMessageBus, MessagePublisher};
use shared_types::NewPatient;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct Harness {
    pub bus: Arc<InMemoryMessageBus>,
    pub store: Arc<InMemoryPatientStore>,
    pub correlator: Arc<Correlator>,
    pub router: Router,
    pub ingestion: Arc<IngestionService>,
    shutdown: watch::Sender<bool>,
    gateway: JoinHandle<GatewayResult<()>>,
    worker: JoinHandle<Result<FlushReport, IngestionError>>,
}

impl Harness {
    pub async fn start(
        staging: &Path,
        store: Arc<InMemoryPatientStore>,
        configure: impl FnOnce(&mut IngestionConfig),
    ) -> Self {
        let bus = Arc::new(InMemoryMessageBus::new());
        let publisher = Arc::clone(&bus) as Arc<dyn MessagePublisher>;

        let mut ingestion_config = IngestionConfig::for_testing(staging);
        configure(&mut ingestion_config);
        let worker = IngestionWorker::start(
            Arc::clone(&store) as Arc<dyn PatientStore>,
            &ingestion_config,
            Arc::clone(&publisher),
            bus.as_ref(),
        )
        .await
        .unwrap();
        let ingestion = worker.service();

        let mut gateway_config = GatewayConfig::default();
        gateway_config.http.enabled = false;
        gateway_config.timeouts.request = Duration::from_secs(5);
        let gateway = ApiGatewayService::new(gateway_config, publisher, bus.as_ref()).unwrap();
        let correlator = gateway.correlator();
        let router = gateway.router();

        let (shutdown, rx) = watch::channel(false);
        let worker = tokio::spawn(worker.run(rx.clone()));
        let gateway = tokio::spawn(gateway.start(rx));

        Self {
            bus,
            store,
            correlator,
            router,
            ingestion,
            shutdown,
            gateway,
            worker,
        }
    }

    /// Stop both halves and return the worker's flush totals.
    pub async fn shutdown(self) -> FlushReport {
        self.shutdown.send(true).unwrap();
        let report = tokio::time::timeout(Duration::from_secs(5), self.worker)
            .await
            .expect("worker did not stop")
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.gateway)
            .await
            .expect("gateway did not stop")
            .unwrap()
            .unwrap();
        self.bus.close();
        report
    }

    /// Poll until the store holds at least `n` records.
    pub async fn wait_for_committed(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.store.len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("records were not committed in time");
    }
}

pub fn ann() -> NewPatient {
    NewPatient {
        name: "Ann".into(),
        last_name: "Li".into(),
        date_of_birth: "1990-01-01".into(),
        blood_type: 2,
        rh_factor: "+".into(),
    }
}

/// Records in every staging artifact left in `dir`.
pub fn staged_rows(dir: &Path) -> usize {
    use hl_02_patient_ingestion::domain::staging::{find_artifacts, read_records};

    find_artifacts(dir)
        .unwrap()
        .iter()
        .map(|path| read_records(path).unwrap().len())
        .sum()
}
