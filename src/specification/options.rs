//! Post-processing Options
//!
//! Each exclusivity group is its own enum, so a resolved selection can hold at most one member
//! of a group by construction.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::specification::{BagType, ValidationError};

/// Zipper closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZipperOption {
    /// Resealable zipper
    With,
    /// No zipper
    Without,
}

/// Surface finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishOption {
    /// Glossy lamination
    Glossy,
    /// Matte varnish
    Matte,
}

/// Tear notch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotchOption {
    /// V-shaped notch
    VNotch,
    /// Straight cut notch
    Straight,
    /// No notch
    Without,
}

/// Hang hole punched above the seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HangHoleOption {
    /// 6mm round hole
    SixMm,
    /// 8mm round hole
    EightMm,
    /// No hang hole
    Without,
}

/// Corner cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CornerOption {
    /// Rounded corners
    Round,
    /// Square corners
    Square,
}

/// Degassing valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValveOption {
    /// One-way valve fitted
    With,
    /// No valve
    Without,
}

/// Side left open for filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpeningOption {
    /// Filled from the top
    Top,
    /// Filled from the bottom
    Bottom,
}

/// Seal width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SealWidthOption {
    /// 5mm seal
    FiveMm,
    /// 7.5mm seal
    SevenHalfMm,
    /// 10mm seal
    TenMm,
}

/// Printing on the gusset panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GussetPrintingOption {
    /// Gusset is printed
    With,
    /// Gusset is left plain
    Without,
}

/// Mutually-exclusive option groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionGroup {
    /// Zipper closure
    Zipper,
    /// Surface finish
    Finish,
    /// Tear notch
    Notch,
    /// Hang hole
    HangHole,
    /// Corner cut
    Corner,
    /// Degassing valve
    Valve,
    /// Filling side
    Opening,
    /// Seal width
    SealWidth,
    /// Gusset printing
    GussetPrinting,
}

impl OptionGroup {
    /// Every group, in canonical order.
    pub const ALL: [OptionGroup; 9] = [
        OptionGroup::Zipper,
        OptionGroup::Finish,
        OptionGroup::Notch,
        OptionGroup::HangHole,
        OptionGroup::Corner,
        OptionGroup::Valve,
        OptionGroup::Opening,
        OptionGroup::SealWidth,
        OptionGroup::GussetPrinting,
    ];

    /// Whether the group can be selected for the given bag type.
    ///
    /// Roll film and spout pouches only carry a finish; gusset printing needs a gusset.
    pub fn applies_to(self, bag_type: BagType) -> bool {
        match (self, bag_type) {
            (OptionGroup::Finish, _) => true,
            (_, BagType::RollFilm | BagType::SpoutPouch) => false,
            (OptionGroup::GussetPrinting, bag_type) => {
                matches!(bag_type, BagType::StandUp | BagType::Box)
            }
            _ => true,
        }
    }

    /// Option selected when the request leaves the group empty.
    pub fn default_option(self) -> PostProcessingOption {
        match self {
            OptionGroup::Zipper => PostProcessingOption::Zipper(ZipperOption::With),
            OptionGroup::Finish => PostProcessingOption::Finish(FinishOption::Glossy),
            OptionGroup::Notch => PostProcessingOption::Notch(NotchOption::VNotch),
            OptionGroup::HangHole => PostProcessingOption::HangHole(HangHoleOption::SixMm),
            OptionGroup::Corner => PostProcessingOption::Corner(CornerOption::Round),
            OptionGroup::Valve => PostProcessingOption::Valve(ValveOption::Without),
            OptionGroup::Opening => PostProcessingOption::Opening(OpeningOption::Top),
            OptionGroup::SealWidth => PostProcessingOption::SealWidth(SealWidthOption::FiveMm),
            OptionGroup::GussetPrinting => {
                PostProcessingOption::GussetPrinting(GussetPrintingOption::Without)
            }
        }
    }
}

/// A single post-processing choice, tagged with its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostProcessingOption {
    /// Zipper closure
    Zipper(ZipperOption),
    /// Surface finish
    Finish(FinishOption),
    /// Tear notch
    Notch(NotchOption),
    /// Hang hole
    HangHole(HangHoleOption),
    /// Corner cut
    Corner(CornerOption),
    /// Degassing valve
    Valve(ValveOption),
    /// Filling side
    Opening(OpeningOption),
    /// Seal width
    SealWidth(SealWidthOption),
    /// Gusset printing
    GussetPrinting(GussetPrintingOption),
}

impl PostProcessingOption {
    /// Every option, in canonical order.
    pub const ALL: [PostProcessingOption; 21] = [
        PostProcessingOption::Zipper(ZipperOption::With),
        PostProcessingOption::Zipper(ZipperOption::Without),
        PostProcessingOption::Finish(FinishOption::Glossy),
        PostProcessingOption::Finish(FinishOption::Matte),
        PostProcessingOption::Notch(NotchOption::VNotch),
        PostProcessingOption::Notch(NotchOption::Straight),
        PostProcessingOption::Notch(NotchOption::Without),
        PostProcessingOption::HangHole(HangHoleOption::SixMm),
        PostProcessingOption::HangHole(HangHoleOption::EightMm),
        PostProcessingOption::HangHole(HangHoleOption::Without),
        PostProcessingOption::Corner(CornerOption::Round),
        PostProcessingOption::Corner(CornerOption::Square),
        PostProcessingOption::Valve(ValveOption::With),
        PostProcessingOption::Valve(ValveOption::Without),
        PostProcessingOption::Opening(OpeningOption::Top),
        PostProcessingOption::Opening(OpeningOption::Bottom),
        PostProcessingOption::SealWidth(SealWidthOption::FiveMm),
        PostProcessingOption::SealWidth(SealWidthOption::SevenHalfMm),
        PostProcessingOption::SealWidth(SealWidthOption::TenMm),
        PostProcessingOption::GussetPrinting(GussetPrintingOption::With),
        PostProcessingOption::GussetPrinting(GussetPrintingOption::Without),
    ];

    /// Group this option belongs to.
    pub fn group(self) -> OptionGroup {
        match self {
            PostProcessingOption::Zipper(_) => OptionGroup::Zipper,
            PostProcessingOption::Finish(_) => OptionGroup::Finish,
            PostProcessingOption::Notch(_) => OptionGroup::Notch,
            PostProcessingOption::HangHole(_) => OptionGroup::HangHole,
            PostProcessingOption::Corner(_) => OptionGroup::Corner,
            PostProcessingOption::Valve(_) => OptionGroup::Valve,
            PostProcessingOption::Opening(_) => OptionGroup::Opening,
            PostProcessingOption::SealWidth(_) => OptionGroup::SealWidth,
            PostProcessingOption::GussetPrinting(_) => OptionGroup::GussetPrinting,
        }
    }

    /// Stable identifier used in requests, pricing tables and persisted quotes.
    pub fn id(self) -> &'static str {
        match self {
            PostProcessingOption::Zipper(ZipperOption::With) => "zipper-yes",
            PostProcessingOption::Zipper(ZipperOption::Without) => "zipper-no",
            PostProcessingOption::Finish(FinishOption::Glossy) => "glossy",
            PostProcessingOption::Finish(FinishOption::Matte) => "matte",
            PostProcessingOption::Notch(NotchOption::VNotch) => "notch-yes",
            PostProcessingOption::Notch(NotchOption::Straight) => "notch-straight",
            PostProcessingOption::Notch(NotchOption::Without) => "notch-no",
            PostProcessingOption::HangHole(HangHoleOption::SixMm) => "hang-hole-6mm",
            PostProcessingOption::HangHole(HangHoleOption::EightMm) => "hang-hole-8mm",
            PostProcessingOption::HangHole(HangHoleOption::Without) => "hang-hole-no",
            PostProcessingOption::Corner(CornerOption::Round) => "corner-round",
            PostProcessingOption::Corner(CornerOption::Square) => "corner-square",
            PostProcessingOption::Valve(ValveOption::With) => "valve-yes",
            PostProcessingOption::Valve(ValveOption::Without) => "valve-no",
            PostProcessingOption::Opening(OpeningOption::Top) => "top-open",
            PostProcessingOption::Opening(OpeningOption::Bottom) => "bottom-open",
            PostProcessingOption::SealWidth(SealWidthOption::FiveMm) => "sealing-width-5mm",
            PostProcessingOption::SealWidth(SealWidthOption::SevenHalfMm) => "sealing-width-7-5mm",
            PostProcessingOption::SealWidth(SealWidthOption::TenMm) => "sealing-width-10mm",
            PostProcessingOption::GussetPrinting(GussetPrintingOption::With) => {
                "machi-printing-yes"
            }
            PostProcessingOption::GussetPrinting(GussetPrintingOption::Without) => {
                "machi-printing-no"
            }
        }
    }
}

impl fmt::Display for PostProcessingOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PostProcessingOption {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostProcessingOption::ALL
            .into_iter()
            .find(|option| option.id() == s.trim())
            .ok_or_else(|| ValidationError::UnknownOption {
                field: "postProcessing",
                value: s.to_string(),
            })
    }
}

impl Serialize for PostProcessingOption {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for PostProcessingOption {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;

        id.parse().map_err(serde::de::Error::custom)
    }
}

/// Resolved post-processing selection: at most one option per group.
///
/// Groups that do not apply to the bag type are absent entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessing {
    selected: Vec<PostProcessingOption>,
}

impl PostProcessing {
    /// Resolve option ids for a bag type.
    ///
    /// Starts from each applicable group's default, then applies the ids in order so the last
    /// selection within a group wins. Ids for groups that do not apply to the bag type are
    /// dropped without error.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownOption`] for an id that matches no option.
    pub fn resolve<S: AsRef<str>>(bag_type: BagType, ids: &[S]) -> Result<Self, ValidationError> {
        let mut selected: Vec<PostProcessingOption> = OptionGroup::ALL
            .into_iter()
            .filter(|group| group.applies_to(bag_type))
            .map(OptionGroup::default_option)
            .collect();

        for id in ids {
            let option: PostProcessingOption = id.as_ref().parse()?;

            if let Some(slot) = selected
                .iter_mut()
                .find(|current| current.group() == option.group())
            {
                *slot = option;
            }
        }

        Ok(Self { selected })
    }

    /// Selected options, one per applicable group, in canonical group order.
    pub fn options(&self) -> &[PostProcessingOption] {
        &self.selected
    }

    /// Selected option for a group, if the group applies.
    pub fn get(&self, group: OptionGroup) -> Option<PostProcessingOption> {
        self.selected
            .iter()
            .copied()
            .find(|option| option.group() == group)
    }

    /// Whether the finish is matte.
    pub fn is_matte(&self) -> bool {
        self.get(OptionGroup::Finish) == Some(PostProcessingOption::Finish(FinishOption::Matte))
    }

    /// Whether a zipper is fitted.
    pub fn has_zipper(&self) -> bool {
        self.get(OptionGroup::Zipper) == Some(PostProcessingOption::Zipper(ZipperOption::With))
    }

    /// Selected option ids.
    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.selected.iter().map(|option| option.id())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn every_id_parses_back_to_its_option() -> TestResult {
        for option in PostProcessingOption::ALL {
            assert_eq!(option.id().parse::<PostProcessingOption>()?, option);
        }

        Ok(())
    }

    #[test]
    fn defaults_cover_every_applicable_group() -> TestResult {
        let resolved = PostProcessing::resolve::<&str>(BagType::StandUp, &[])?;

        assert_eq!(
            resolved.ids().collect::<Vec<_>>(),
            [
                "zipper-yes",
                "glossy",
                "notch-yes",
                "hang-hole-6mm",
                "corner-round",
                "valve-no",
                "top-open",
                "sealing-width-5mm",
                "machi-printing-no",
            ]
        );

        Ok(())
    }

    #[test]
    fn last_selection_in_a_group_wins() -> TestResult {
        let resolved =
            PostProcessing::resolve(BagType::FlatThreeSide, &["matte", "glossy", "matte"])?;

        assert!(resolved.is_matte());
        assert_eq!(
            resolved
                .options()
                .iter()
                .filter(|option| option.group() == OptionGroup::Finish)
                .count(),
            1
        );

        Ok(())
    }

    #[test]
    fn selections_in_other_groups_do_not_interfere() -> TestResult {
        let forward = PostProcessing::resolve(BagType::FlatThreeSide, &["zipper-no", "matte"])?;
        let reverse = PostProcessing::resolve(BagType::FlatThreeSide, &["matte", "zipper-no"])?;

        assert_eq!(forward, reverse);
        assert!(!forward.has_zipper());

        Ok(())
    }

    #[test]
    fn roll_film_keeps_only_the_finish_group() -> TestResult {
        let resolved =
            PostProcessing::resolve(BagType::RollFilm, &["zipper-yes", "valve-yes", "matte"])?;

        assert_eq!(resolved.ids().collect::<Vec<_>>(), ["matte"]);

        Ok(())
    }

    #[test]
    fn gusset_printing_requires_a_gusset() -> TestResult {
        let flat = PostProcessing::resolve(BagType::FlatThreeSide, &["machi-printing-yes"])?;
        let boxed = PostProcessing::resolve(BagType::Box, &["machi-printing-yes"])?;

        assert_eq!(flat.get(OptionGroup::GussetPrinting), None);
        assert_eq!(
            boxed.get(OptionGroup::GussetPrinting),
            Some(PostProcessingOption::GussetPrinting(GussetPrintingOption::With))
        );

        Ok(())
    }

    #[test]
    fn unknown_ids_are_rejected_even_for_filtered_groups() {
        let result = PostProcessing::resolve(BagType::RollFilm, &["laser-cut"]);

        assert!(matches!(
            result,
            Err(ValidationError::UnknownOption { value, .. }) if value == "laser-cut"
        ));
    }
}
