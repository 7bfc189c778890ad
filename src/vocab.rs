use serde::Serialize;

// Closed, ordered option tables. Validity of an enumerated field means
// membership in its table; order matters because the first entry doubles as
// the default where one is needed.

pub const F_STOPS: &[&str] = &[
    "f/0.95", "f/1.2", "f/1.4", "f/1.8", "f/2.0", "f/2.8", "f/4.0", "f/5.6",
    "f/8.0", "f/11", "f/16", "f/22", "f/32",
];

pub const SHUTTER_ANGLES: &[&str] = &[
    "11.25° (Skinny / Staccato)",
    "45° (High Action)",
    "90° (Crisp)",
    "144°",
    "172.8°",
    "180° (Standard)",
    "270° (Smooth)",
    "360° (Dreamy / Blur)",
];

pub const SENSOR_FORMATS: &[&str] = &[
    "IMAX 70mm (15-perf)",
    "Arri Alexa 65 (Large Format)",
    "VistaVision",
    "Full Frame 35mm",
    "Super 35",
    "Micro 4/3",
    "16mm Film",
    "8mm Vintage",
];

pub const LIGHTING_TYPES: &[&str] = &[
    "Natural / Sunlight",
    "Softbox / Diffused",
    "Hard Light / Spotlight",
    "Rembrandt Lighting",
    "Rim Light / Backlight",
    "Neon / Practical",
    "Ring Light (Beauty)",
    "Cinematic Top Light",
];

pub const LIGHTING_TEMPS: &[&str] = &[
    "Neutral (5600K)",
    "Warm / Golden (3200K)",
    "Cool / Blue (7000K+)",
    "Neon Red",
    "Neon Blue",
    "Neon Green",
    "Candlelight",
];

pub const THEMES: &[&str] = &[
    "Sci-Fi", "Noir", "Fantasy", "Horror", "Western", "Documentary",
    "Vintage", "Cinematic",
];

pub const COMPOSITIONS: &[&str] = &[
    "Rule of Thirds",
    "Center Framed",
    "Symmetrical",
    "Leading Lines",
    "Golden Ratio",
    "Negative Space",
    "Framing",
    "Dutch Angle",
];

pub const ARTIST_STYLES: &[&str] = &[
    "Roger Deakins",
    "Wes Anderson",
    "Ridley Scott",
    "Christopher Nolan",
    "Wong Kar-wai",
    "Denis Villeneuve",
    "Tim Burton",
    "Zack Snyder",
];

pub const COLOR_GRADES: &[&str] = &[
    "Teal and Orange",
    "Black and White",
    "Neon Vaporwave",
    "Vintage Kodachrome",
    "Desaturated",
    "Pastel",
    "Warm Golden",
    "Cool Blue",
];

pub const ATMOSPHERES: &[&str] = &[
    "Foggy", "Rainy", "Dusty", "Cinematic Haze", "Snowing", "Smoke",
    "Sparks", "Lens Flares",
];

pub const CHARACTER_COUNTS: &[&str] = &["1", "2", "3+", "crowd"];

const ARRANGEMENTS_SOLO: &[&str] = &[
    "Center Frame",
    "Rule of Thirds",
    "Off-screen Gaze",
    "Back to Camera",
    "Extreme Close-up",
    "Silhouette",
    "Reflection in Mirror",
    "Looking Down",
    "Looking Up",
    "Walking Away",
    "Running Towards Camera",
    "Profile View",
    "Lying Down",
    "Sitting on Edge",
    "Peeking Around Corner",
    "Dynamic Action Jump",
    "Floating / Weightless",
    "Shadow Interaction",
    "Framed by Environment",
    "Negative Space Dominance",
];

const ARRANGEMENTS_DUO: &[&str] = &[
    "Face to Face",
    "Side by Side",
    "Back to Back",
    "Over the Shoulder",
    "Foreground/Background",
    "Dancing / Embrace",
    "Chasing",
    "Mirror Image",
    "Whisper in Ear",
    "Holding Hands",
    "One Sitting One Standing",
    "Yin Yang Composition",
    "Leading by Hand",
    "Fighting / Grappling",
    "Kissing",
    "Walk and Talk",
    "One Looking One Away",
    "Silhouette against Light",
    "Reflections",
    "Vertically Stacked",
];

const ARRANGEMENTS_GROUP: &[&str] = &[
    "Triangle Formation",
    "Linear Line-up",
    "Circular Ring",
    "Scattered",
    "V-Formation",
    "Pyramidal Stacking",
    "Dinner Table",
    "Converging on Center",
    "Walking in Slow Motion",
    "Huddle",
    "Staggered Depth",
    "Looking in Different Directions",
    "Follow the Leader",
    "Carrying/Lifting",
    "Circle of Trust",
    "Backs Turned",
    "Framing the Void",
    "Dynamic Action Scatter",
    "Stadium Seating",
    "Reflection Group",
];

const ARRANGEMENTS_CROWD: &[&str] = &[
    "Dense Packing",
    "Organized Formation",
    "Chaos/Panic",
    "Audience/Spectators",
    "Sea of Faces",
    "Mosh Pit / Rave",
    "Commuter Flow",
    "Protest / March",
    "Circle Pit",
    "Looking Up",
    "Silhouettes in Fog",
    "Pixelated Pattern",
    "Zombie Horde",
    "Red Carpet Paparazzi",
    "Battle Charge",
    "Market Bustle",
    "Religious Gathering",
    "Aftermath",
    "Cheerleader Pyramid",
    "Infinite Reflection",
];

/// Arrangement vocabulary for a character count. Unknown counts get the solo
/// list so a caller always has a non-empty table to validate against.
pub fn arrangements_for(count: &str) -> &'static [&'static str] {
    match count {
        "1" => ARRANGEMENTS_SOLO,
        "2" => ARRANGEMENTS_DUO,
        "3+" => ARRANGEMENTS_GROUP,
        "crowd" => ARRANGEMENTS_CROWD,
        _ => ARRANGEMENTS_SOLO,
    }
}

pub fn default_arrangement(count: &str) -> &'static str {
    arrangements_for(count)[0]
}

pub fn is_member(table: &[&str], token: &str) -> bool {
    table.iter().any(|t| *t == token)
}

// Randomize only ever draws from the prime lenses, not the full 12-200mm dial.
pub const RANDOM_FOCAL_LENGTHS: &[f64] = &[16.0, 24.0, 35.0, 50.0, 85.0, 135.0];

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPreset {
    pub id: &'static str,
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
    pub focal_length: f64,
    pub aperture: &'static str,
    pub shutter_angle: &'static str,
    pub iso: u32,
    pub sensor_format: &'static str,
}

pub const CAMERA_PRESETS: &[CameraPreset] = &[
    CameraPreset {
        id: "portrait",
        azimuth: 15.0,
        elevation: 5.0,
        distance: 2.0,
        focal_length: 85.0,
        aperture: "f/1.8",
        shutter_angle: "180° (Standard)",
        iso: 400,
        sensor_format: "Full Frame 35mm",
    },
    CameraPreset {
        id: "wide",
        azimuth: 45.0,
        elevation: 20.0,
        distance: 8.0,
        focal_length: 24.0,
        aperture: "f/8.0",
        shutter_angle: "180° (Standard)",
        iso: 100,
        sensor_format: "VistaVision",
    },
    CameraPreset {
        id: "action",
        azimuth: 60.0,
        elevation: -10.0,
        distance: 4.0,
        focal_length: 35.0,
        aperture: "f/2.8",
        shutter_angle: "45° (High Action)",
        iso: 800,
        sensor_format: "Super 35",
    },
    CameraPreset {
        id: "macro",
        azimuth: 0.0,
        elevation: 45.0,
        distance: 1.0,
        focal_length: 100.0,
        aperture: "f/2.8",
        shutter_angle: "180° (Standard)",
        iso: 200,
        sensor_format: "Full Frame 35mm",
    },
    CameraPreset {
        id: "cinematic",
        azimuth: 30.0,
        elevation: 0.0,
        distance: 5.0,
        focal_length: 50.0,
        aperture: "f/2.0",
        shutter_angle: "180° (Standard)",
        iso: 800,
        sensor_format: "Arri Alexa 65 (Large Format)",
    },
];

pub fn camera_preset(id: &str) -> Option<&'static CameraPreset> {
    CAMERA_PRESETS.iter().find(|p| p.id == id)
}
