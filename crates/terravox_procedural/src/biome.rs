//! # Biome Classification
//!
//! Maps world columns to biomes and ground heights.
//!
//! Uses a small climate model:
//! - Elevation (fractal + ridged noise) decides water, lowland and mountains
//! - Temperature (noise minus altitude chill) and humidity pick the land biome

use terravox_shared::BlockType;

use crate::noise::{Fractal, SimplexNoise, WorldSeed};

/// Biomes produced by the classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Biome {
    /// Below sea level.
    Ocean = 0,
    /// Shoreline.
    Beach = 1,
    /// Grassland.
    Plains = 2,
    /// Temperate forest.
    Forest = 3,
    /// Hot and dry.
    Desert = 4,
    /// Wetland.
    Swamp = 5,
    /// High rocky ground.
    Mountains = 6,
    /// Cold summits.
    SnowyPeaks = 7,
}

impl Biome {
    /// Primary ground block and the layer overrides above it.
    ///
    /// Layers are listed from the surface downward.
    #[must_use]
    pub fn ground_profile(self) -> (BlockType, Vec<BlockType>) {
        match self {
            Self::Ocean => (BlockType::SAND, Vec::new()),
            Self::Beach => (
                BlockType::ROCK,
                vec![BlockType::SAND, BlockType::SAND, BlockType::SAND],
            ),
            Self::Plains | Self::Forest => (
                BlockType::STONE,
                vec![BlockType::GRASS, BlockType::DIRT, BlockType::DIRT],
            ),
            Self::Desert => (BlockType::SAND, Vec::new()),
            Self::Swamp => (BlockType::DIRT, vec![BlockType::MUD, BlockType::MUD]),
            Self::Mountains => (BlockType::ROCK, Vec::new()),
            Self::SnowyPeaks => (BlockType::ROCK, vec![BlockType::SNOW]),
        }
    }

    /// Chance in `[0, 1)` that a column of this biome grows a tree.
    #[must_use]
    pub const fn tree_chance(self) -> f64 {
        match self {
            Self::Forest => 0.03,
            Self::Swamp => 0.015,
            Self::Plains => 0.002,
            _ => 0.0,
        }
    }

    /// Chance in `[0, 1)` that a column of this biome carries a boulder.
    #[must_use]
    pub const fn rock_chance(self) -> f64 {
        match self {
            Self::Mountains => 0.01,
            Self::Desert => 0.002,
            _ => 0.0,
        }
    }
}

/// Climate-based biome classifier.
pub struct BiomeClassifier {
    elevation_noise: SimplexNoise,
    ridge_noise: SimplexNoise,
    temperature_noise: SimplexNoise,
    humidity_noise: SimplexNoise,
}

impl BiomeClassifier {
    const ELEVATION: Fractal = Fractal::new(0.0025, 4);
    const RIDGES: Fractal = Fractal::new(0.004, 3);
    const TEMPERATURE: Fractal = Fractal::new(0.002, 2);
    const HUMIDITY: Fractal = Fractal::new(0.003, 3);

    /// Creates a classifier from a world seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            elevation_noise: SimplexNoise::new(seed.derive(1)),
            ridge_noise: SimplexNoise::new(seed.derive(2)),
            temperature_noise: SimplexNoise::new(seed.derive(3)),
            humidity_noise: SimplexNoise::new(seed.derive(4)),
        }
    }

    /// Elevation in roughly `[-1, 1]`; negative is under water.
    #[must_use]
    pub fn elevation(&self, x: f64, z: f64) -> f64 {
        let base = self.elevation_noise.fbm(x, z, Self::ELEVATION);
        let ridges = self.ridge_noise.ridged(x, z, Self::RIDGES);

        // ridges only lift ground that is already high
        let lift = (base - 0.2).max(0.0) * ridges * 1.5;
        Self::flatten_lowlands(base + lift).clamp(-1.0, 1.0)
    }

    /// Compresses the middle band so lowlands stay walkable.
    #[inline]
    fn flatten_lowlands(elevation: f64) -> f64 {
        if (-0.1..0.3).contains(&elevation) {
            -0.1 + (elevation + 0.1) * 0.5
        } else if elevation >= 0.3 {
            0.1 + (elevation - 0.3) * (0.9 / 0.7)
        } else {
            elevation
        }
    }

    /// Temperature in `[-1, 1]`, colder with altitude.
    #[must_use]
    pub fn temperature(&self, x: f64, z: f64, elevation: f64) -> f64 {
        let base = self.temperature_noise.fbm(x, z, Self::TEMPERATURE);
        (base - elevation.max(0.0) * 0.6).clamp(-1.0, 1.0)
    }

    /// Humidity in `[-1, 1]`.
    #[must_use]
    pub fn humidity(&self, x: f64, z: f64) -> f64 {
        self.humidity_noise.fbm(x, z, Self::HUMIDITY)
    }

    /// Classifies the biome of a column.
    #[must_use]
    pub fn classify(&self, x: f64, z: f64) -> Biome {
        let elevation = self.elevation(x, z);
        let temperature = self.temperature(x, z, elevation);
        let humidity = self.humidity(x, z);
        Self::classify_climate(elevation, temperature, humidity)
    }

    /// Classifies from precomputed climate values.
    #[must_use]
    pub fn classify_climate(elevation: f64, temperature: f64, humidity: f64) -> Biome {
        if elevation < -0.15 {
            return Biome::Ocean;
        }
        if elevation < -0.08 {
            return Biome::Beach;
        }
        if elevation > 0.55 {
            return if temperature < -0.1 {
                Biome::SnowyPeaks
            } else {
                Biome::Mountains
            };
        }

        match (temperature, humidity) {
            (t, h) if t > 0.35 && h < -0.1 => Biome::Desert,
            (_, h) if h > 0.45 && elevation < 0.0 => Biome::Swamp,
            (_, h) if h > 0.05 => Biome::Forest,
            _ => Biome::Plains,
        }
    }

    /// Ground height of a column around `sea_level`.
    ///
    /// `amplitude` is the height reached at elevation 1.0 above sea level.
    #[must_use]
    pub fn ground_height(&self, x: f64, z: f64, sea_level: i32, amplitude: i32) -> i32 {
        let elevation = self.elevation(x, z);
        sea_level + (elevation * f64::from(amplitude)).round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biome_determinism() {
        let a = BiomeClassifier::new(WorldSeed::new(42));
        let b = BiomeClassifier::new(WorldSeed::new(42));

        for i in 0..100 {
            let x = f64::from(i) * 100.0;
            let z = f64::from(i) * 73.0;
            assert_eq!(a.classify(x, z), b.classify(x, z));
        }
    }

    #[test]
    fn test_water_at_low_elevation() {
        assert_eq!(BiomeClassifier::classify_climate(-0.6, 0.0, 0.0), Biome::Ocean);
        assert_eq!(BiomeClassifier::classify_climate(-0.1, 0.0, 0.0), Biome::Beach);
        assert_eq!(BiomeClassifier::classify_climate(0.8, -0.5, 0.0), Biome::SnowyPeaks);
    }

    #[test]
    fn test_several_biomes_reachable() {
        let classifier = BiomeClassifier::new(WorldSeed::new(12345));
        let mut found = std::collections::HashSet::new();

        for x in (-3000..3000).step_by(60) {
            for z in (-3000..3000).step_by(60) {
                found.insert(classifier.classify(f64::from(x), f64::from(z)));
            }
        }

        assert!(found.len() >= 3, "expected varied biomes, found {found:?}");
    }

    #[test]
    fn test_ground_height_bounded() {
        let classifier = BiomeClassifier::new(WorldSeed::new(42));

        for i in 0..500 {
            let height = classifier.ground_height(f64::from(i) * 10.0, f64::from(i) * 7.0, 64, 48);
            assert!((16..=112).contains(&height), "height {height} out of range");
        }
    }

    #[test]
    fn test_layer_profiles_put_soft_ground_on_top() {
        let (primary, layers) = Biome::Beach.ground_profile();
        assert_eq!(primary, BlockType::ROCK);
        assert_eq!(layers.first(), Some(&BlockType::SAND));
        assert!(Biome::Ocean.ground_profile().1.is_empty());
    }
}
