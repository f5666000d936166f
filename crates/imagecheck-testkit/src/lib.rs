// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const VEHICLE_HEADER: [&str; 5] = [
    "Base Model",
    "Product Name",
    "Paint Description",
    "VRM",
    "Image URL",
];

const BASE_MODELS: [(&str, &[&str]); 4] = [
    ("Defender", &["Defender 90", "Defender 110", "Defender 130"]),
    ("Discovery", &["Discovery", "Discovery Sport"]),
    ("Range Rover", &["RR VELAR", "RR EVOQUE", "RR SPORT"]),
    ("Freelander", &["Freelander 2"]),
];

const PAINTS: [&str; 8] = [
    "Silicon Silver",
    "Carpathian Grey",
    "Santorini Black",
    "Fuji White",
    "Gondwana Stone",
    "Tasman Blue",
    "Pangea Green",
    "Firenze Red",
];

const VRM_LETTERS: [char; 20] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'R', 'S', 'T', 'V',
    'X', 'Y',
];

const IMAGE_HOSTS: [&str; 3] = [
    "https://images.example-dealer.com",
    "https://cdn.fleet-photos.net",
    "https://media.showroom.example",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub base_model: String,
    pub product_name: String,
    pub paint: String,
    pub vrm: String,
    pub image_url: String,
}

impl Vehicle {
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.base_model,
            &self.product_name,
            &self.paint,
            &self.vrm,
            &self.image_url,
        ]
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of vehicle catalog rows.
#[derive(Debug, Clone)]
pub struct CatalogFaker {
    rng: DeterministicRng,
}

impl CatalogFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn vehicle(&mut self) -> Vehicle {
        let (base_model, products) = BASE_MODELS[self.rng.int_n(BASE_MODELS.len())];
        let product_name = products[self.rng.int_n(products.len())];
        let paint = self.pick(&PAINTS);
        let vrm = self.vrm();
        let host = self.pick(&IMAGE_HOSTS);
        Vehicle {
            base_model: base_model.to_owned(),
            product_name: product_name.to_owned(),
            paint: paint.to_owned(),
            image_url: format!("{host}/stock/{}.jpg", vrm.to_ascii_lowercase()),
            vrm,
        }
    }

    pub fn vehicles(&mut self, count: usize) -> Vec<Vehicle> {
        (0..count).map(|_| self.vehicle()).collect()
    }

    /// A complete catalog file: header line plus `count` rows.
    pub fn catalog_csv(&mut self, count: usize) -> String {
        let mut out = csv_line(&VEHICLE_HEADER);
        out.push('\n');
        for vehicle in self.vehicles(count) {
            out.push_str(&csv_line(&vehicle.fields()));
            out.push('\n');
        }
        out
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn vrm(&mut self) -> String {
        let mut out = String::with_capacity(7);
        for _ in 0..2 {
            out.push(VRM_LETTERS[self.rng.int_n(VRM_LETTERS.len())]);
        }
        out.push_str(&format!("{:02}", 20 + self.rng.int_n(6)));
        for _ in 0..3 {
            out.push(VRM_LETTERS[self.rng.int_n(VRM_LETTERS.len())]);
        }
        out
    }
}

/// Joins fields with commas, wrapping any field that contains a comma in
/// quotes.
pub fn csv_line(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| {
            if field.contains(',') {
                format!("\"{field}\"")
            } else {
                (*field).to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// The example from the upload screen: three vehicles with an image column.
pub fn sample_catalog() -> &'static str {
    "Base Model,Product Name,Paint Description,VRM,Image URL\n\
     Defender,Defender 110,Silicon Silver,KR25NXP,https://images.example-dealer.com/kr25nxp.jpg\n\
     Range Rover,RR VELAR,Carpathian Grey,KR25RHY,https://images.example-dealer.com/kr25rhy.jpg\n\
     Defender,Defender 90,Carpathian Grey,KR25ABC,https://images.example-dealer.com/kr25abc.jpg\n"
}

pub fn temp_catalog(contents: &str) -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("catalog.csv");
    std::fs::write(&path, contents)
        .with_context(|| format!("write catalog fixture {}", path.display()))?;
    Ok((dir, path))
}

#[cfg(test)]
mod tests {
    use super::{CatalogFaker, VEHICLE_HEADER, csv_line, sample_catalog, temp_catalog};
    use anyhow::Result;

    #[test]
    fn same_seed_same_rows() {
        let mut left = CatalogFaker::new(42);
        let mut right = CatalogFaker::new(42);
        assert_eq!(left.vehicles(5), right.vehicles(5));
    }

    #[test]
    fn zero_seed_is_normalized() {
        let mut zero = CatalogFaker::new(0);
        let mut one = CatalogFaker::new(1);
        assert_eq!(zero.vehicle(), one.vehicle());
    }

    #[test]
    fn vehicle_fields_are_populated() {
        let mut faker = CatalogFaker::new(7);
        for vehicle in faker.vehicles(20) {
            assert_eq!(vehicle.vrm.len(), 7, "vrm {}", vehicle.vrm);
            assert!(vehicle.image_url.starts_with("https://"));
            assert!(vehicle.image_url.ends_with(".jpg"));
            assert!(!vehicle.paint.is_empty());
        }
    }

    #[test]
    fn catalog_csv_has_header_and_rows() {
        let mut faker = CatalogFaker::new(3);
        let csv = faker.catalog_csv(4);
        let lines = csv.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], VEHICLE_HEADER.join(","));
    }

    #[test]
    fn csv_line_quotes_fields_with_commas() {
        assert_eq!(csv_line(&["Smith, John", "hi"]), "\"Smith, John\",hi");
    }

    #[test]
    fn sample_catalog_has_three_rows() {
        assert_eq!(sample_catalog().lines().count(), 4);
    }

    #[test]
    fn temp_catalog_writes_file() -> Result<()> {
        let (_dir, path) = temp_catalog("a,b\n")?;
        assert_eq!(std::fs::read_to_string(path)?, "a,b\n");
        Ok(())
    }
}
