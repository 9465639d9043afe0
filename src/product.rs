use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Client applications whose logs are shipped by the agent.
///
/// Declaration order is the iteration order used everywhere (settings files,
/// scheduler ticks, status output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Product {
    #[serde(rename = "MD_NEXT")]
    MdNext,
    #[serde(rename = "MD_RED3")]
    MdRed3,
    #[serde(rename = "MD_RED4")]
    MdRed4,
    #[serde(rename = "MD_VIDEO")]
    MdVideo,
    #[serde(rename = "MD_LIVE")]
    MdLive,
    #[serde(rename = "MD_CLOUD")]
    MdCloud,
    #[serde(rename = "MD_DRONE")]
    MdDrone,
}

#[derive(Debug, Error)]
#[error("unknown product '{0}'")]
pub struct UnknownProduct(pub String);

impl Product {
    pub const ALL: [Product; 7] = [
        Product::MdNext,
        Product::MdRed3,
        Product::MdRed4,
        Product::MdVideo,
        Product::MdLive,
        Product::MdCloud,
        Product::MdDrone,
    ];

    /// Name used on the wire and in settings files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::MdNext => "MD_NEXT",
            Product::MdRed3 => "MD_RED3",
            Product::MdRed4 => "MD_RED4",
            Product::MdVideo => "MD_VIDEO",
            Product::MdLive => "MD_LIVE",
            Product::MdCloud => "MD_CLOUD",
            Product::MdDrone => "MD_DRONE",
        }
    }

    /// Install folder names under `MD-Series/`; some products log to more
    /// than one folder.
    fn install_folders(&self) -> &'static [&'static str] {
        match self {
            Product::MdNext => &["MD-NEXT"],
            Product::MdRed3 => &["MD-RED"],
            Product::MdRed4 => &["MD-RED4"],
            Product::MdVideo => &["MD-MEDIA", "MD-VIDEO"],
            Product::MdLive => &["MD-LIVE"],
            Product::MdCloud => &["MD-CLOUD"],
            Product::MdDrone => &["MD-DRONE"],
        }
    }

    /// Log directories the product writes to when installed under `base`.
    pub fn default_log_directories(&self, base: &Path) -> Vec<PathBuf> {
        self.install_folders()
            .iter()
            .map(|folder| base.join("MD-Series").join(folder).join("Log"))
            .collect()
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = UnknownProduct;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Product::ALL
            .into_iter()
            .find(|product| product.as_str() == s)
            .ok_or_else(|| UnknownProduct(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip_through_from_str() {
        for product in Product::ALL {
            assert_eq!(product.as_str().parse::<Product>().unwrap(), product);
        }
        assert!("MD_UNKNOWN".parse::<Product>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Product::MdVideo).unwrap();
        assert_eq!(json, "\"MD_VIDEO\"");
    }

    #[test]
    fn test_video_has_two_default_directories() {
        let dirs = Product::MdVideo.default_log_directories(Path::new("/data"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/data/MD-Series/MD-MEDIA/Log"),
                PathBuf::from("/data/MD-Series/MD-VIDEO/Log"),
            ]
        );
    }

    #[test]
    fn test_order_is_declaration_order() {
        let mut sorted = Product::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, Product::ALL.to_vec());
    }
}
