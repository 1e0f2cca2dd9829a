/// Region registry for the consolidation engine.
///
/// Defines the canonical list of administrative regions the engine operates
/// over, with centroid coordinates, the half-width of the extraction box and
/// the regional rainy-season window. This is the single source of truth for
/// region identity. Source readers resolve every incoming region name here
/// and drop rows that do not match.

// ---------------------------------------------------------------------------
// Region metadata
// ---------------------------------------------------------------------------

/// Metadata for a single administrative region.
#[derive(Debug)]
pub struct Region {
    /// Stable lowercase ASCII identifier.
    pub id: &'static str,
    /// Official region name, accents included.
    pub name: &'static str,
    /// WGS84 latitude of the centroid.
    pub latitude: f64,
    /// WGS84 longitude of the centroid.
    pub longitude: f64,
    /// Half-width, in degrees, of the box sources are averaged over.
    pub buffer_deg: f64,
    /// First month (1-12) of the rainy season, inclusive.
    pub rainy_season_start_month: u32,
    /// Last month (1-12) of the rainy season, inclusive.
    pub rainy_season_end_month: u32,
}

impl Region {
    /// True if `month` falls inside the region's rainy-season window.
    /// Windows that wrap the year end (start > end) are supported.
    pub fn is_rainy_month(&self, month: u32) -> bool {
        let (start, end) = (self.rainy_season_start_month, self.rainy_season_end_month);
        if start <= end {
            (start..=end).contains(&month)
        } else {
            month >= start || month <= end
        }
    }

    /// `(min_lon, min_lat, max_lon, max_lat)` of the extraction box.
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        (
            self.longitude - self.buffer_deg,
            self.latitude - self.buffer_deg,
            self.longitude + self.buffer_deg,
            self.latitude + self.buffer_deg,
        )
    }
}

/// The fourteen regions of Senegal.
///
/// The rainy season arrives first in the south-east and last in the Sahelian
/// north, so the window varies by region.
pub static REGION_REGISTRY: &[Region] = &[
    Region {
        id: "dakar",
        name: "Dakar",
        latitude: 14.7167,
        longitude: -17.4677,
        buffer_deg: 0.2,
        rainy_season_start_month: 7,
        rainy_season_end_month: 10,
    },
    Region {
        id: "diourbel",
        name: "Diourbel",
        latitude: 14.6558,
        longitude: -16.2334,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "fatick",
        name: "Fatick",
        latitude: 14.3396,
        longitude: -16.4114,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "kaffrine",
        name: "Kaffrine",
        latitude: 14.1050,
        longitude: -15.5500,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "kaolack",
        name: "Kaolack",
        latitude: 14.1469,
        longitude: -16.0726,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "kedougou",
        name: "Kédougou",
        latitude: 12.5556,
        longitude: -12.1744,
        buffer_deg: 0.4,
        rainy_season_start_month: 5,
        rainy_season_end_month: 10,
    },
    Region {
        id: "kolda",
        name: "Kolda",
        latitude: 12.8833,
        longitude: -14.9500,
        buffer_deg: 0.4,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "louga",
        name: "Louga",
        latitude: 15.6144,
        longitude: -16.2286,
        buffer_deg: 0.4,
        rainy_season_start_month: 7,
        rainy_season_end_month: 10,
    },
    Region {
        id: "matam",
        name: "Matam",
        latitude: 15.6600,
        longitude: -13.2550,
        buffer_deg: 0.4,
        rainy_season_start_month: 7,
        rainy_season_end_month: 10,
    },
    Region {
        id: "saint-louis",
        name: "Saint-Louis",
        latitude: 16.0179,
        longitude: -16.4896,
        buffer_deg: 0.3,
        rainy_season_start_month: 7,
        rainy_season_end_month: 10,
    },
    Region {
        id: "sedhiou",
        name: "Sédhiou",
        latitude: 12.7089,
        longitude: -15.5561,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "tambacounda",
        name: "Tambacounda",
        latitude: 13.7707,
        longitude: -13.6673,
        buffer_deg: 0.5,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "thies",
        name: "Thiès",
        latitude: 14.7910,
        longitude: -16.9250,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
    Region {
        id: "ziguinchor",
        name: "Ziguinchor",
        latitude: 12.5833,
        longitude: -16.2719,
        buffer_deg: 0.3,
        rainy_season_start_month: 6,
        rainy_season_end_month: 10,
    },
];

/// Looks up a region by identifier or name. Matching ignores case, accents
/// and the choice of separator, so "Kédougou", "KEDOUGOU" and "saint louis"
/// all resolve. Returns `None` if not found.
pub fn find_region(name: &str) -> Option<&'static Region> {
    let key = normalize_name(name);
    if key.is_empty() {
        return None;
    }
    REGION_REGISTRY
        .iter()
        .find(|r| normalize_name(r.id) == key || normalize_name(r.name) == key)
}

/// Folds a region name to lowercase ASCII with `-` as the only separator.
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        let folded = match c {
            'à' | 'â' | 'ä' | 'À' | 'Â' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'î' | 'ï' | 'Î' | 'Ï' => 'i',
            'ô' | 'ö' | 'Ô' | 'Ö' => 'o',
            'ù' | 'û' | 'ü' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            ' ' | '_' | '-' => '-',
            other => other.to_ascii_lowercase(),
        };
        if folded == '-' && out.ends_with('-') {
            continue;
        }
        out.push(folded);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
