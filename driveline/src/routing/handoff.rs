//! Hand-off to external turn-by-turn navigation apps.
//!
//! Builds deep links that open Waze or Google Maps with the current
//! destination. Google Maps uses a different scheme per platform; hosts that
//! are neither iOS nor Android get the web directions URL.

use crate::geo::GeoPoint;
use crate::platform::DevicePlatform;

/// External navigation apps the destination can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationApp {
    Waze,
    GoogleMaps,
}

impl NavigationApp {
    pub const ALL: [NavigationApp; 2] = [NavigationApp::Waze, NavigationApp::GoogleMaps];

    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationApp::Waze => "waze",
            NavigationApp::GoogleMaps => "google-maps",
        }
    }

    /// Display name for buttons and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            NavigationApp::Waze => "Waze",
            NavigationApp::GoogleMaps => "Google Maps",
        }
    }

    /// URL a host opens to check whether the app is installed.
    pub fn install_check_url(&self, platform: DevicePlatform) -> &'static str {
        match (self, platform) {
            (NavigationApp::Waze, _) => "waze://",
            (NavigationApp::GoogleMaps, DevicePlatform::Ios) => "comgooglemaps://",
            (NavigationApp::GoogleMaps, DevicePlatform::Android) => "google.navigation:q=0,0",
            (NavigationApp::GoogleMaps, DevicePlatform::Other) => "https://www.google.com/maps",
        }
    }
}

impl std::fmt::Display for NavigationApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deep link that starts driving navigation to `destination` in `app`.
pub fn handoff_url(app: NavigationApp, platform: DevicePlatform, destination: &GeoPoint) -> String {
    let (lat, lon) = (destination.latitude, destination.longitude);
    match (app, platform) {
        (NavigationApp::Waze, _) => format!("waze://?ll={},{}&navigate=yes", lat, lon),
        (NavigationApp::GoogleMaps, DevicePlatform::Ios) => {
            format!("comgooglemaps://?daddr={},{}&directionsmode=driving", lat, lon)
        }
        (NavigationApp::GoogleMaps, DevicePlatform::Android) => {
            format!("google.navigation:q={},{}", lat, lon)
        }
        (NavigationApp::GoogleMaps, DevicePlatform::Other) => format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}&travelmode=driving",
            lat, lon
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEST: GeoPoint = GeoPoint::new(-23.55, -46.63);

    #[test]
    fn test_waze_is_platform_independent() {
        for platform in [DevicePlatform::Android, DevicePlatform::Ios, DevicePlatform::Other] {
            assert_eq!(
                handoff_url(NavigationApp::Waze, platform, &DEST),
                "waze://?ll=-23.55,-46.63&navigate=yes"
            );
        }
    }

    #[test]
    fn test_google_maps_per_platform() {
        assert_eq!(
            handoff_url(NavigationApp::GoogleMaps, DevicePlatform::Ios, &DEST),
            "comgooglemaps://?daddr=-23.55,-46.63&directionsmode=driving"
        );
        assert_eq!(
            handoff_url(NavigationApp::GoogleMaps, DevicePlatform::Android, &DEST),
            "google.navigation:q=-23.55,-46.63"
        );
        assert!(handoff_url(NavigationApp::GoogleMaps, DevicePlatform::Other, &DEST)
            .starts_with("https://www.google.com/maps/dir/"));
    }

    #[test]
    fn test_install_check_urls() {
        assert_eq!(NavigationApp::Waze.install_check_url(DevicePlatform::Ios), "waze://");
        assert_eq!(
            NavigationApp::GoogleMaps.install_check_url(DevicePlatform::Ios),
            "comgooglemaps://"
        );
    }
}
