use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::preferences::Preferences;

/// Lower-cases and strips separators so `"TSWoman"`, `"ts_woman"` and
/// `"ts-woman"` compare equal.
pub(crate) fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Declares a closed vocabulary enum together with the suffix it carries in
/// legacy flag columns (`b_wantBodySlim` -> `Slim`).
macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $key:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Suffix used by the legacy flag columns for this value.
            pub fn flag_suffix(self) -> &'static str {
                match self {
                    $($name::$variant => $key),+
                }
            }

            /// Parse either the flag suffix or the snake_case name, ignoring case.
            pub fn parse(raw: &str) -> Option<Self> {
                let wanted = normalize_key(raw);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| normalize_key(value.flag_suffix()) == wanted)
            }
        }
    };
}

vocabulary! {
    /// Gender / pairing identity a profile presents as.
    Gender {
        Man => "Man",
        Woman => "Woman",
        TsMan => "TSMan",
        TsWoman => "TSWoman",
        CdMan => "CDMan",
        CdWoman => "CDWoman",
        CoupleMf => "CoupleMF",
        CoupleMm => "CoupleMM",
        CoupleFf => "CoupleFF",
        Group => "Group",
    }
}

vocabulary! {
    BodyType {
        Tiny => "Tiny",
        Slim => "Slim",
        Average => "Average",
        Muscular => "Muscular",
        Curvy => "Curvy",
        Thick => "Thick",
        Bbw => "BBW",
    }
}

vocabulary! {
    Ethnicity {
        White => "White",
        Asian => "Asian",
        Latino => "Latino",
        Indian => "Indian",
        Black => "Black",
        Other => "Other",
    }
}

vocabulary! {
    HairColor {
        Light => "Light",
        Medium => "Medium",
        Dark => "Dark",
        Red => "Red",
        Gray => "Gray",
        Other => "Other",
    }
}

vocabulary! {
    HairLength {
        Bald => "Bald",
        Short => "Short",
        Medium => "Medium",
        Long => "Long",
    }
}

vocabulary! {
    /// Self-rated overall looks, ordered from lowest to highest.
    Looks {
        Ugly => "Ugly",
        Plain => "Plain",
        Quirky => "Quirky",
        Average => "Average",
        Attractive => "Attractive",
        Hottie => "Hottie",
        SuperModel => "SuperModel",
    }
}

vocabulary! {
    Intelligence {
        GoodHands => "GoodHands",
        BitSlow => "BitSlow",
        Average => "Average",
        Faster => "Faster",
        Genius => "Genius",
    }
}

vocabulary! {
    /// Bedroom intensity, from passive to aggressive.
    BedroomPersonality {
        Passive => "Passive",
        Shy => "Shy",
        Confident => "Confident",
        Aggressive => "Aggressive",
    }
}

vocabulary! {
    SexualActivity {
        SafeSex => "SafeSex",
        BarebackSex => "BarebackSex",
        OralGive => "OralGive",
        OralReceive => "OralReceive",
        AnalTop => "AnalTop",
        AnalBottom => "AnalBottom",
        Filming => "Filming",
        Voyeur => "Voyeur",
        Exhibitionist => "Exhibitionist",
        Roleplay => "Roleplay",
        Spanking => "Spanking",
        Dom => "Dom",
        Sub => "Sub",
        Strapon => "Strapon",
        Cuckold => "Cuckold",
        Furry => "Furry",
    }
}

vocabulary! {
    /// Where a user is willing to meet.
    MeetingPlace {
        MyPlace => "MyPlace",
        YouHost => "YouHost",
        CarDate => "CarDate",
        HotelIPay => "HotelIPay",
        HotelYouPay => "HotelYouPay",
        HotelSplit => "HotelSplit",
        BarClub => "BarClub",
        GymSauna => "GymSauna",
        NudeBeach => "NudeBeach",
        Other => "Other",
    }
}

vocabulary! {
    /// Health conditions that act as hard dealbreakers.
    HealthCondition {
        Hiv => "HIV",
        Herpes => "Herpes",
        Warts => "Warts",
        Hepatitis => "Hepatitis",
        OtherSti => "OtherSTI",
    }
}

vocabulary! {
    /// Lifestyle habits that carry a soft penalty when the other side rejects them.
    LifestyleHabit {
        Cigarettes => "Cigarettes",
        HeavyDrinking => "HeavyDrinking",
        Marijuana => "Marijuana",
        OtherDrugs => "OtherDrugs",
        Polyamory => "Polyamory",
        MarriedSecret => "MarriedSecret",
    }
}

impl Looks {
    /// 1-based ordinal rank.
    pub fn rank(self) -> i32 {
        self as i32 + 1
    }
}

impl Intelligence {
    pub fn rank(self) -> i32 {
        self as i32 + 1
    }
}

impl BedroomPersonality {
    pub fn rank(self) -> i32 {
        self as i32 + 1
    }

    /// Passive and shy sit on the low side of the intensity scale.
    pub fn is_low_intensity(self) -> bool {
        self.rank() <= 2
    }
}

impl LifestyleHabit {
    /// Penalty subtracted from the lifestyle score when the habit conflicts.
    pub fn penalty(self) -> f64 {
        match self {
            LifestyleHabit::Cigarettes => 15.0,
            LifestyleHabit::HeavyDrinking => 10.0,
            LifestyleHabit::Marijuana => 10.0,
            LifestyleHabit::OtherDrugs => 15.0,
            LifestyleHabit::Polyamory => 20.0,
            LifestyleHabit::MarriedSecret => 20.0,
        }
    }
}

/// Geographic coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Inclusive age window a user is interested in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

pub const DEFAULT_MIN_AGE: u8 = 18;
pub const DEFAULT_MAX_AGE: u8 = 99;

impl AgeRange {
    /// Builds a range, swapping the bounds if they arrive inverted.
    pub fn new(min: u8, max: u8) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[inline]
    pub fn contains(&self, age: u8) -> bool {
        age >= self.min && age <= self.max
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_AGE,
            max: DEFAULT_MAX_AGE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthFlags {
    #[serde(default)]
    pub has: BTreeSet<HealthCondition>,
    #[serde(default)]
    pub rejects: BTreeSet<HealthCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifestyleFlags {
    #[serde(default)]
    pub practices: BTreeSet<LifestyleHabit>,
    #[serde(default)]
    pub rejects: BTreeSet<LifestyleHabit>,
}

/// A user's stored attributes and preferences, already normalized.
///
/// Profiles are read-only inputs to the matching core; nothing in `core`
/// mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(default)]
    pub location: Option<GeoPoint>,

    #[serde(default)]
    pub body_type: Option<BodyType>,
    #[serde(default)]
    pub ethnicity: Option<Ethnicity>,
    #[serde(default)]
    pub hair_color: Option<HairColor>,
    #[serde(default)]
    pub hair_length: Option<HairLength>,

    #[serde(default)]
    pub looks: Option<Looks>,
    #[serde(default)]
    pub intelligence: Option<Intelligence>,
    #[serde(default)]
    pub bedroom_personality: Option<BedroomPersonality>,

    #[serde(default)]
    pub wants: Preferences,
    #[serde(default)]
    pub health: HealthFlags,
    #[serde(default)]
    pub lifestyle: LifestyleFlags,

    #[serde(default)]
    pub age_range: AgeRange,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub interests: Vec<String>,

    #[serde(default)]
    pub current_venue_id: Option<String>,
    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub has_public_bio: bool,
    #[serde(default)]
    pub has_private_bio: bool,
    #[serde(default)]
    pub has_avatar: bool,
}

impl Profile {
    /// Minimal profile with every optional field absent.
    pub fn new(user_id: impl Into<String>, age: u8, gender: Gender) -> Self {
        Self {
            user_id: user_id.into(),
            age,
            gender,
            location: None,
            body_type: None,
            ethnicity: None,
            hair_color: None,
            hair_length: None,
            looks: None,
            intelligence: None,
            bedroom_personality: None,
            wants: Preferences::default(),
            health: HealthFlags::default(),
            lifestyle: LifestyleFlags::default(),
            age_range: AgeRange::default(),
            max_distance_km: None,
            interests: Vec::new(),
            current_venue_id: None,
            last_active_at: None,
            created_at: None,
            has_public_bio: false,
            has_private_bio: false,
            has_avatar: false,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(GeoPoint::new(latitude, longitude));
        self
    }

    /// Number of populated profile-completeness fields and the total tracked.
    pub fn completeness(&self) -> (usize, usize) {
        let fields = [
            self.has_public_bio,
            self.has_private_bio,
            self.has_avatar,
            self.body_type.is_some(),
            self.ethnicity.is_some(),
            self.hair_color.is_some(),
        ];
        (fields.iter().filter(|f| **f).count(), fields.len())
    }

    /// True when both profiles report the same non-empty venue.
    pub fn shares_venue_with(&self, other: &Profile) -> bool {
        match (&self.current_venue_id, &other.current_venue_id) {
            (Some(a), Some(b)) => !a.is_empty() && a == b,
            _ => false,
        }
    }
}
