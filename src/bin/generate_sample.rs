//! Write a small synthetic dataset and pack it into a blob container.
//!
//! ```text
//! OUT_DIR/
//!   images/img_000.png ...      RGB gradients with noise
//!   masks/img_000.png ...       single-channel instance maps
//!   train.csv, val.csv          image,seg_map,class,split
//!   signals/instances.csv       seg_map paths relative to signals/
//! OUT_DIR.redb                  the same tree, one file
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};

use spai_data::RedbFileStorage;

const IMAGE_SIZE: u32 = 64;
const SAMPLES: usize = 12;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn below(&mut self, n: u32) -> u32 {
        (self.next_u64() % n as u64) as u32
    }
}

fn gradient_image(rng: &mut SimpleRng) -> RgbImage {
    let tint = [rng.below(256) as u8, rng.below(256) as u8, rng.below(256) as u8];
    RgbImage::from_fn(IMAGE_SIZE, IMAGE_SIZE, |x, y| {
        let noise = rng.below(16) as u8;
        Rgb([
            tint[0].wrapping_add((x * 4) as u8).wrapping_add(noise),
            tint[1].wrapping_add((y * 4) as u8),
            tint[2].wrapping_sub(noise),
        ])
    })
}

/// Up to three labelled rectangles on a zero background.
fn instance_map(rng: &mut SimpleRng) -> GrayImage {
    let mut map = GrayImage::new(IMAGE_SIZE, IMAGE_SIZE);
    let instances = 1 + rng.below(3);
    for label in 1..=instances {
        let (x0, y0) = (rng.below(IMAGE_SIZE / 2), rng.below(IMAGE_SIZE / 2));
        let (w, h) = (8 + rng.below(IMAGE_SIZE / 2), 8 + rng.below(IMAGE_SIZE / 2));
        for y in y0..(y0 + h).min(IMAGE_SIZE) {
            for x in x0..(x0 + w).min(IMAGE_SIZE) {
                map.put_pixel(x, y, Luma([label as u8]));
            }
        }
    }
    map
}

fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_dataset"));
    for sub in ["images", "masks", "signals"] {
        fs::create_dir_all(out_dir.join(sub))
            .with_context(|| format!("creating {}", out_dir.join(sub).display()))?;
    }

    let mut rng = SimpleRng::new(42);
    let mut train = Vec::new();
    let mut val = Vec::new();
    let mut instances = Vec::new();

    for i in 0..SAMPLES {
        let name = format!("img_{i:03}.png");
        gradient_image(&mut rng)
            .save_with_format(out_dir.join("images").join(&name), ImageFormat::Png)
            .with_context(|| format!("writing image {name}"))?;
        instance_map(&mut rng)
            .save_with_format(out_dir.join("masks").join(&name), ImageFormat::Png)
            .with_context(|| format!("writing mask {name}"))?;

        let class = (i % 2).to_string();
        let split = if i % 4 == 3 { "val" } else { "train" };
        let row = vec![
            format!("images/{name}"),
            format!("masks/{name}"),
            class.clone(),
            split.to_string(),
        ];
        if split == "val" {
            val.push(row);
        } else {
            train.push(row);
        }
        instances.push(vec![format!("../masks/{name}"), class]);
    }

    let header = ["image", "seg_map", "class", "split"];
    write_csv(&out_dir.join("train.csv"), &header, &train)?;
    write_csv(&out_dir.join("val.csv"), &header, &val)?;
    write_csv(
        &out_dir.join("signals/instances.csv"),
        &["seg_map", "class"],
        &instances,
    )?;

    let container = out_dir.with_extension("redb");
    if container.exists() {
        fs::remove_file(&container)
            .with_context(|| format!("removing stale {}", container.display()))?;
    }
    let storage = RedbFileStorage::create(&container)
        .with_context(|| format!("creating {}", container.display()))?;
    let packed = storage
        .pack_directory(&out_dir)
        .with_context(|| format!("packing {}", out_dir.display()))?;

    println!(
        "Wrote {SAMPLES} samples ({} train, {} val) to {} and packed {packed} files into {}",
        train.len(),
        val.len(),
        out_dir.display(),
        container.display()
    );
    Ok(())
}
