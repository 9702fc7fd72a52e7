//! Assemble the concrete store, clock and providers into the RPC state.

use crate::config::NexusConfig;
use anyhow::Context;
use nexus_audit::{ActivityLog, StatusProjection};
use nexus_crypto::UrlSigner;
use nexus_pairing::PairingEngine;
use nexus_providers::{FsObjectStore, HttpBiometricProvider, HttpDocumentAnalyzer};
use nexus_rpc::AppState;
use nexus_store::NexusStore;
use nexus_store_lmdb::LmdbStore;
use nexus_types::{Clock, SystemClock};
use nexus_verification::{Providers, VerificationPipeline};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

pub fn build_state(config: &NexusConfig) -> anyhow::Result<Arc<AppState>> {
    let lmdb_dir = config.lmdb_dir();
    let store: Arc<dyn NexusStore> = Arc::new(
        LmdbStore::open(&lmdb_dir, config.map_size)
            .with_context(|| format!("opening LMDB at {}", lmdb_dir.display()))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let secret = Zeroizing::new(
        config
            .object_store
            .signing_secret
            .clone()
            .context("no upload signing secret configured")?
            .into_bytes(),
    );
    let signer = UrlSigner::new(secret.to_vec()).context("building upload signer")?;
    std::fs::create_dir_all(&config.object_store.root).with_context(|| {
        format!("creating object root {}", config.object_store.root.display())
    })?;
    let objects = Arc::new(FsObjectStore::new(
        &config.object_store.root,
        &config.object_store.public_base_url,
        signer,
    ));

    let timeout = Duration::from_secs(config.providers.timeout_secs);
    let providers = Providers {
        objects: objects.clone(),
        documents: Arc::new(HttpDocumentAnalyzer::new(&config.providers.ocr_url, timeout)),
        biometrics: Arc::new(HttpBiometricProvider::new(
            &config.providers.biometrics_url,
            timeout,
        )),
    };

    let pairing = PairingEngine::new(store.clone(), clock.clone(), config.pairing.clone())
        .context("pairing parameters")?;
    let pipeline = VerificationPipeline::new(
        providers,
        store.clone(),
        clock.clone(),
        config.verification.clone(),
    );

    Ok(Arc::new(AppState {
        pairing,
        pipeline,
        projection: StatusProjection::new(store.clone()),
        activity: ActivityLog::new(store.clone(), clock.clone()),
        store,
        clock,
        uploads: Some(objects),
    }))
}
