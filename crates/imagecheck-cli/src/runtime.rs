// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use imagecheck_app::ImageStatus;
use imagecheck_relay::Client;
use imagecheck_tui::{InternalEvent, ProbeEvent};
use std::fs;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;

/// The catalog shown on the upload screen, used by `--demo`.
pub const DEMO_CATALOG: &str = "Base Model,Product Name,Paint Description,VRM,Image URL\n\
Defender,Defender 110,Silicon Silver,KR25NXP,https://images.example-dealer.com/kr25nxp.jpg\n\
Range Rover,RR VELAR,Carpathian Grey,KR25RHY,https://images.example-dealer.com/kr25rhy.jpg\n";

pub const DEMO_SOURCE: &str = "demo catalog";

pub struct FsRuntime {
    relay: Option<Client>,
}

impl FsRuntime {
    pub fn new(relay: Option<Client>) -> Self {
        Self { relay }
    }
}

impl imagecheck_tui::AppRuntime for FsRuntime {
    fn read_catalog(&mut self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("read {}", path.display()))
    }

    fn relay_base(&self) -> Option<String> {
        self.relay.as_ref().map(|client| client.base_url().to_owned())
    }

    fn probe_image(&mut self, image_url: &str) -> ImageStatus {
        match &self.relay {
            Some(client) => client.probe(image_url),
            None => ImageStatus::Unchecked,
        }
    }

    fn spawn_probes(
        &mut self,
        batch_id: u64,
        image_urls: Vec<String>,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let Some(client) = self.relay.clone() else {
            return Ok(());
        };

        thread::Builder::new()
            .name(format!("probe-{batch_id}"))
            .spawn(move || {
                for image_url in image_urls {
                    let status = client.probe(&image_url);
                    let event = InternalEvent::Probe(ProbeEvent {
                        batch_id,
                        image_url,
                        status,
                    });
                    if tx.send(event).is_err() {
                        tracing::debug!(batch_id, "gallery closed before probes finished");
                        return;
                    }
                }
            })
            .context("spawn probe worker")?;
        Ok(())
    }
}
