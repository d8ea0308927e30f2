use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::board::evaluation::{KNIGHT_SCORE, PAWN_SCORE, ROOK_SCORE};
use crate::piece::Colour;
use crate::util::MAX_ENGINE_DEPTH;

/// Feature toggles and tunables for one search. Passed down the tree by
/// value, so a node can switch a heuristic off for its own subtree (the
/// null-move and multi-cut prunes do) without unwinding anything.
#[derive(Clone, Copy, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct SearchSettings {
    pub on_pv: bool,
    pub null_window_search: bool,
    pub use_killer_moves: bool,
    pub search_recapture_first: bool,

    pub null_move_prune: bool,
    pub null_move_depth: i32,

    pub aspiration_window: bool,
    pub aspiration_window_size: i32,

    pub futility_prune: bool,
    pub futility_cutoff: i32,

    pub extended_futility_prune: bool,
    pub extended_futility_cutoff: i32,

    pub multi_cut_prune: bool,
    pub multi_cut_moves: u32,
    pub multi_cut_threshold: u32,
    pub multi_cut_depth: i32,

    pub late_move_reduction: bool,
    pub num_late_moves_sub: u32,
    pub num_late_moves_div: u32,
    pub late_move_sub: i32,
    pub late_move_div: i32,

    pub quiescence_depth_limit: i32,
    pub do_delta_pruning: bool,
    pub delta_pruning_margin: i32,

    /// Cut-node parity, flipped at every ply; multi-cut only fires on
    /// expected cut nodes.
    pub expected_cut_node: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            on_pv: true,
            null_window_search: true,
            use_killer_moves: true,
            search_recapture_first: true,
            null_move_prune: true,
            null_move_depth: 4,
            aspiration_window: true,
            aspiration_window_size: PAWN_SCORE,
            futility_prune: true,
            futility_cutoff: KNIGHT_SCORE,
            extended_futility_prune: true,
            extended_futility_cutoff: ROOK_SCORE,
            multi_cut_prune: true,
            multi_cut_moves: 6,
            multi_cut_threshold: 3,
            multi_cut_depth: 3,
            late_move_reduction: true,
            num_late_moves_sub: 5,
            num_late_moves_div: 10,
            late_move_sub: 1,
            late_move_div: 2,
            quiescence_depth_limit: MAX_ENGINE_DEPTH as i32,
            do_delta_pruning: true,
            delta_pruning_margin: 2 * PAWN_SCORE,
            expected_cut_node: false,
        }
    }
}

impl SearchSettings {
    /// Applies a named feature flag, for `engine`/`compare` command
    /// lines. Unknown names are rejected.
    pub fn apply_flag(&mut self, flag: &str) -> bool {
        match flag {
            "default" => {}
            "nolatemoveprune" => self.late_move_reduction = false,
            "nomulticut" => self.multi_cut_prune = false,
            "nokiller" => self.use_killer_moves = false,
            "nonullmove" => self.null_move_prune = false,
            "norecapturefirst" => self.search_recapture_first = false,
            "nonullwindow" => self.null_window_search = false,
            "nofutilityprune" => self.futility_prune = false,
            "noextendedfutilityprune" => self.extended_futility_prune = false,
            "noaspiration" => self.aspiration_window = false,
            "nodeltapruning" => self.do_delta_pruning = false,
            "weaklatemoveprune" => {
                self.num_late_moves_sub = 6;
                self.num_late_moves_div = 12;
                self.late_move_sub = 1;
                self.late_move_div = 2;
            }
            "weakmulticut" => {
                self.multi_cut_depth = 2;
                self.multi_cut_moves = 5;
                self.multi_cut_threshold = 3;
            }
            "weaknullmove" => self.null_move_depth = 2,
            "weakfutilityprune" => self.futility_cutoff = KNIGHT_SCORE + PAWN_SCORE,
            "weakextendedfutilityprune" => self.extended_futility_cutoff = ROOK_SCORE + PAWN_SCORE,
            "stronglatemoveprune" => {
                self.num_late_moves_sub = 4;
                self.num_late_moves_div = 8;
                self.late_move_sub = 1;
                self.late_move_div = 2;
            }
            "strongmulticut" => {
                self.multi_cut_depth = 4;
                self.multi_cut_moves = 7;
                self.multi_cut_threshold = 3;
            }
            "strongnullmove" => self.null_move_depth = 5,
            "strongfutilityprune" => self.futility_cutoff = KNIGHT_SCORE - PAWN_SCORE,
            "strongextendedfutilityprune" => {
                self.extended_futility_cutoff = ROOK_SCORE - PAWN_SCORE;
            }
            "noprune" => {
                self.late_move_reduction = false;
                self.multi_cut_prune = false;
                self.null_move_prune = false;
                self.futility_prune = false;
                self.extended_futility_prune = false;
            }
            "weakprune" => {
                for preset in [
                    "weaklatemoveprune",
                    "weakmulticut",
                    "weaknullmove",
                    "weakfutilityprune",
                    "weakextendedfutilityprune",
                ] {
                    self.apply_flag(preset);
                }
            }
            "strongprune" => {
                for preset in [
                    "stronglatemoveprune",
                    "strongmulticut",
                    "strongnullmove",
                    "strongfutilityprune",
                    "strongextendedfutilityprune",
                ] {
                    self.apply_flag(preset);
                }
            }
            "noenhancements" => {
                self.apply_flag("noprune");
                self.use_killer_moves = false;
                self.search_recapture_first = false;
                self.null_window_search = false;
            }
            _ => return false,
        }
        true
    }
}

/// What one `engine` invocation should do.
#[derive(Clone, Copy, Debug)]
pub struct EngineSettings {
    /// Iterative-deepening depth limit, when `use_time` is off.
    pub depth: u32,
    /// Wall-clock budget, when `use_time` is on.
    pub time: Duration,
    pub use_time: bool,
    /// The side to search for; must match the position's side to move.
    pub side: Colour,
    /// Apply the chosen move to the position when it is legal.
    pub do_move: bool,
    pub print_stats: bool,
    pub search: SearchSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            depth: 6,
            time: Duration::from_millis(1000),
            use_time: false,
            side: Colour::White,
            do_move: false,
            print_stats: false,
            search: SearchSettings::default(),
        }
    }
}

/// Node and cutoff counters for one search, reported after `engine`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub normal_nodes: u64,
    pub quiescence_nodes: u64,
    pub main_tt_hits: u64,
    pub q_tt_hits: u64,
    pub null_move_cutoffs: u64,
    pub futility_cutoffs: u64,
    pub extended_futility_cutoffs: u64,
    pub multi_cut_cutoffs: u64,
    pub late_move_reductions: u64,
    pub null_window_researches: u64,
    pub killer_moves_tried: u64,
    pub draws_detected: u64,
}

impl Display for SearchStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Positions searched    : {}", self.nodes)?;
        writeln!(f, "Normal searched       : {}", self.normal_nodes)?;
        writeln!(f, "Quiescence searched   : {}", self.quiescence_nodes)?;
        writeln!(f, "TransTable hits       : {}", self.main_tt_hits)?;
        writeln!(f, "QSearch TT hits       : {}", self.q_tt_hits)?;
        writeln!(f, "Null Move Prunes      : {}", self.null_move_cutoffs)?;
        writeln!(f, "Futility Prunes       : {}", self.futility_cutoffs)?;
        writeln!(f, "Extended Fut. Prunes  : {}", self.extended_futility_cutoffs)?;
        writeln!(f, "MultiCut Prunes       : {}", self.multi_cut_cutoffs)?;
        writeln!(f, "Late Move Reductions  : {}", self.late_move_reductions)?;
        writeln!(f, "Null Window ReSearches: {}", self.null_window_researches)?;
        writeln!(f, "Num Killer Moves Done : {}", self.killer_moves_tried)?;
        write!(f, "NumDraws              : {}", self.draws_detected)
    }
}

mod tests {
    #![allow(unused_imports)]
    use super::SearchSettings;

    #[test]
    fn flags_toggle_features() {
        let mut settings = SearchSettings::default();
        assert!(settings.apply_flag("nonullmove"));
        assert!(!settings.null_move_prune);
        assert!(settings.apply_flag("weaknullmove"));
        assert_eq!(settings.null_move_depth, 2);
        assert!(settings.apply_flag("noenhancements"));
        assert!(!settings.use_killer_moves);
        assert!(!settings.null_window_search);
        assert!(!settings.futility_prune);
        assert!(!settings.apply_flag("nosuchflag"));
    }
}
