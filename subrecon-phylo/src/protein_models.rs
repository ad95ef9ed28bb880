//! Empirical amino acid replacement models.
//!
//! Dayhoff, JTT, WAG and BLOSUM62 exchangeabilities are embedded in PAML
//! lower-triangle order (row `i` lists `S[i][0..i]`). Custom models are read
//! from the same PAML text layout: 190 exchangeabilities followed by 20
//! frequencies.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::warn;
use subrecon_core::{ReconError, Reportable, Result};

use crate::alphabet::{amino_acid_symbol, AA_STATES};
use crate::subst_model::{build_rate_matrix, normalize_frequencies, EigenSystem, SubstitutionModel};

/// Number of free exchangeability values in a reversible 20-state model.
const N_EXCHANGE: usize = AA_STATES * (AA_STATES - 1) / 2;

/// Frequencies supplied by the user may be off by this much before a
/// warning is logged.
const FREQUENCY_TOLERANCE: f64 = 1e-6;

/// Dayhoff et al. (1978) exchangeabilities, PAML `dayhoff.dat`.
#[rustfmt::skip]
static DAYHOFF_EXCHANGE: [f64; 190] = [
    27.0,
    98.0, 32.0,
    120.0, 0.0, 905.0,
    36.0, 23.0, 0.0, 0.0,
    89.0, 246.0, 103.0, 134.0, 0.0,
    198.0, 1.0, 148.0, 1153.0, 0.0, 716.0,
    240.0, 9.0, 139.0, 125.0, 11.0, 28.0, 81.0,
    23.0, 240.0, 535.0, 86.0, 28.0, 606.0, 43.0, 10.0,
    65.0, 64.0, 77.0, 24.0, 44.0, 18.0, 61.0, 0.0, 7.0,
    41.0, 15.0, 34.0, 0.0, 0.0, 73.0, 11.0, 7.0, 44.0, 257.0,
    26.0, 464.0, 318.0, 71.0, 0.0, 153.0, 83.0, 27.0, 26.0, 46.0, 18.0,
    72.0, 90.0, 1.0, 0.0, 0.0, 114.0, 30.0, 17.0, 0.0, 336.0, 527.0, 243.0,
    18.0, 14.0, 14.0, 0.0, 0.0, 0.0, 0.0, 15.0, 48.0, 196.0, 157.0, 0.0, 92.0,
    250.0, 103.0, 42.0, 13.0, 19.0, 153.0, 51.0, 34.0, 94.0, 12.0, 32.0, 33.0, 17.0, 11.0,
    409.0, 154.0, 495.0, 95.0, 161.0, 56.0, 79.0, 234.0, 35.0, 24.0, 17.0, 96.0, 62.0, 46.0, 245.0,
    371.0, 26.0, 229.0, 66.0, 16.0, 53.0, 34.0, 30.0, 22.0, 192.0, 33.0, 136.0, 104.0, 13.0, 78.0, 550.0,
    0.0, 201.0, 23.0, 0.0, 0.0, 0.0, 0.0, 0.0, 27.0, 0.0, 46.0, 0.0, 0.0, 76.0, 0.0, 75.0, 0.0,
    24.0, 8.0, 95.0, 0.0, 96.0, 0.0, 22.0, 0.0, 127.0, 37.0, 28.0, 13.0, 0.0, 698.0, 0.0, 34.0, 42.0, 61.0,
    208.0, 24.0, 15.0, 18.0, 49.0, 35.0, 37.0, 54.0, 44.0, 889.0, 175.0, 10.0, 258.0, 12.0, 48.0, 30.0, 157.0, 0.0, 28.0,
];

/// Jones, Taylor & Thornton (1992) exchangeabilities, PAML `jones.dat`.
#[rustfmt::skip]
static JTT_EXCHANGE: [f64; 190] = [
    58.0,
    54.0, 45.0,
    81.0, 16.0, 528.0,
    56.0, 113.0, 34.0, 10.0,
    57.0, 310.0, 86.0, 49.0, 9.0,
    105.0, 29.0, 58.0, 767.0, 5.0, 323.0,
    179.0, 137.0, 81.0, 130.0, 59.0, 26.0, 119.0,
    27.0, 328.0, 391.0, 112.0, 69.0, 597.0, 26.0, 23.0,
    36.0, 22.0, 47.0, 11.0, 17.0, 9.0, 12.0, 6.0, 16.0,
    30.0, 38.0, 12.0, 7.0, 23.0, 72.0, 9.0, 6.0, 56.0, 229.0,
    35.0, 646.0, 263.0, 26.0, 7.0, 292.0, 181.0, 27.0, 45.0, 21.0, 14.0,
    54.0, 44.0, 30.0, 15.0, 31.0, 43.0, 18.0, 14.0, 33.0, 479.0, 388.0, 65.0,
    15.0, 5.0, 10.0, 4.0, 78.0, 4.0, 5.0, 5.0, 40.0, 89.0, 248.0, 4.0, 43.0,
    194.0, 74.0, 15.0, 15.0, 14.0, 164.0, 18.0, 24.0, 115.0, 10.0, 102.0, 21.0, 16.0, 17.0,
    378.0, 101.0, 503.0, 59.0, 223.0, 53.0, 30.0, 201.0, 73.0, 40.0, 59.0, 47.0, 29.0, 92.0, 285.0,
    475.0, 64.0, 232.0, 38.0, 42.0, 51.0, 32.0, 33.0, 46.0, 245.0, 25.0, 103.0, 226.0, 12.0, 118.0, 477.0,
    9.0, 126.0, 8.0, 4.0, 115.0, 18.0, 10.0, 55.0, 8.0, 9.0, 52.0, 10.0, 24.0, 53.0, 6.0, 35.0, 12.0,
    11.0, 20.0, 70.0, 46.0, 209.0, 24.0, 7.0, 8.0, 573.0, 32.0, 24.0, 8.0, 18.0, 536.0, 10.0, 63.0, 21.0, 71.0,
    298.0, 17.0, 16.0, 31.0, 62.0, 20.0, 45.0, 47.0, 11.0, 961.0, 180.0, 14.0, 323.0, 62.0, 23.0, 38.0, 112.0, 25.0, 16.0,
];

/// Whelan & Goldman (2001) exchangeabilities, PAML `wag.dat`.
#[rustfmt::skip]
static WAG_EXCHANGE: [f64; 190] = [
    0.551571,
    0.509848, 0.635346,
    0.738998, 0.147304, 5.429420,
    1.027040, 0.528191, 0.265256, 0.030295,
    0.908598, 3.035500, 1.543640, 0.616783, 0.098818,
    1.582850, 0.439157, 0.947198, 6.174160, 0.021352, 5.469470,
    1.416720, 0.584665, 1.125560, 0.865584, 0.306674, 0.330052, 0.567717,
    0.316954, 2.137150, 3.956290, 0.930676, 0.248972, 4.294110, 0.570025, 0.249410,
    0.193335, 0.186979, 0.554236, 0.039437, 0.170135, 0.113917, 0.127395, 0.030450, 0.138190,
    0.397915, 0.497671, 0.131528, 0.084805, 0.384287, 0.869489, 0.154263, 0.061304, 0.499462, 3.170970,
    0.906265, 5.351420, 3.012010, 0.479855, 0.074034, 3.894900, 2.584430, 0.373558, 0.890432, 0.323832, 0.257555,
    0.893496, 0.683162, 0.198221, 0.103754, 0.390482, 1.545260, 0.315124, 0.174100, 0.404141, 4.257460, 4.854020, 0.934276,
    0.210494, 0.102711, 0.096162, 0.046730, 0.398020, 0.099921, 0.081134, 0.049931, 0.679371, 1.059470, 2.115170, 0.088836, 1.190630,
    1.438550, 0.679489, 0.195081, 0.423984, 0.109404, 0.933372, 0.682355, 0.243570, 0.696198, 0.099929, 0.415844, 0.556896, 0.171329, 0.161444,
    3.370790, 1.224190, 3.974230, 1.071760, 1.407660, 1.028870, 0.704939, 1.341820, 0.740169, 0.319440, 0.344739, 0.967130, 0.493905, 0.545931, 1.613280,
    2.121110, 0.554413, 2.030060, 0.374866, 0.512984, 0.857928, 0.822765, 0.225833, 0.473307, 1.458160, 0.326622, 1.386980, 1.516120, 0.171903, 0.795384, 4.378020,
    0.113133, 1.163920, 0.071917, 0.129767, 0.717070, 0.215737, 0.156557, 0.336983, 0.262569, 0.212483, 0.665309, 0.137505, 0.515706, 1.529640, 0.139405, 0.523742, 0.110864,
    0.240735, 0.381533, 1.086000, 0.325711, 0.543833, 0.227710, 0.196303, 0.103604, 3.873440, 0.420170, 0.398618, 0.133264, 0.428437, 6.454280, 0.216046, 0.786993, 0.291148, 2.485390,
    2.006010, 0.251849, 0.196246, 0.152335, 1.002140, 0.301281, 0.588731, 0.187247, 0.118358, 7.821300, 1.800340, 0.305434, 2.058450, 0.649892, 0.314887, 0.232739, 1.388230, 0.365369, 0.314730,
];

/// Henikoff & Henikoff (1992) BLOSUM62 expressed as a rate matrix
/// (Veerassamy, Smith & Tillier 2003).
#[rustfmt::skip]
static BLOSUM62_EXCHANGE: [f64; 190] = [
    0.735790,
    0.485391, 1.297447,
    0.543162, 0.500964, 3.180100,
    1.459995, 0.227827, 0.397359, 0.240837,
    1.199706, 3.020834, 1.839216, 1.190946, 0.329802,
    1.170949, 1.360574, 1.240489, 3.761625, 0.140749, 5.528919,
    1.955884, 0.418763, 1.355872, 0.798473, 0.418203, 0.609846, 0.423580,
    0.716241, 1.456141, 2.414501, 0.778143, 0.354058, 2.435341, 1.626891, 0.539859,
    0.605899, 0.232036, 0.283017, 0.418556, 0.774894, 0.236202, 0.186848, 0.189296, 0.252718,
    0.800017, 0.622712, 0.211888, 0.218132, 0.831843, 0.580737, 0.372625, 0.217721, 0.348072, 3.890964,
    1.295201, 5.411115, 1.593137, 1.032448, 0.285079, 3.945278, 2.802427, 0.752042, 1.022507, 0.406194, 0.445570,
    1.253758, 0.983693, 0.648441, 0.222622, 0.767689, 2.494896, 0.555415, 0.459436, 0.984312, 3.364798, 6.030559, 1.073061,
    0.492965, 0.371645, 0.354861, 0.281731, 0.441337, 0.144357, 0.291409, 0.368166, 0.714534, 1.517359, 2.064840, 0.266925, 1.773855,
    1.173276, 0.448134, 0.494887, 0.730628, 0.356008, 0.858571, 0.926564, 0.504087, 0.527007, 0.388355, 0.374556, 1.047383, 0.454124, 0.233598,
    4.325093, 1.122783, 2.904102, 1.582754, 1.197188, 1.934871, 1.769893, 1.509326, 1.117030, 0.357544, 0.352969, 1.752166, 0.918723, 0.540028, 1.169130,
    1.729178, 0.914666, 1.898174, 0.934188, 1.119831, 1.277480, 1.071097, 0.641436, 0.585407, 1.179091, 0.915260, 1.303875, 1.488548, 0.488206, 1.005452, 5.151556,
    0.465839, 0.426382, 0.191482, 0.145345, 0.527664, 0.758654, 0.407636, 0.508359, 0.301249, 0.341986, 0.691475, 0.332243, 0.888101, 2.074325, 0.252215, 0.387926, 0.513128,
    0.718207, 0.720517, 0.538223, 0.261422, 0.470238, 0.958990, 0.596719, 0.308056, 4.218954, 0.674617, 0.811246, 0.717993, 0.951682, 6.747260, 0.369405, 0.796752, 0.801010, 4.054419,
    2.187775, 0.438388, 0.312859, 0.258129, 1.116352, 0.530786, 0.524254, 0.253341, 0.201556, 8.311839, 2.231406, 0.498138, 2.575851, 0.838120, 0.496908, 0.561925, 2.253074, 0.266509, 1.000000,
];

static DAYHOFF_FREQS: [f64; AA_STATES] = [
    0.087127, 0.040904, 0.040432, 0.046872, 0.033474, 0.038255,
    0.049530, 0.088612, 0.033619, 0.036886, 0.085357, 0.080481,
    0.014753, 0.039772, 0.050680, 0.069577, 0.058542, 0.010494,
    0.029916, 0.064718,
];

static JTT_FREQS: [f64; AA_STATES] = [
    0.076748, 0.051691, 0.042645, 0.051544, 0.019803, 0.040752,
    0.061830, 0.073152, 0.022944, 0.053761, 0.091904, 0.058676,
    0.023826, 0.040126, 0.050901, 0.068765, 0.058565, 0.014261,
    0.032102, 0.066005,
];

static WAG_FREQS: [f64; AA_STATES] = [
    0.0866279, 0.043972, 0.0390894, 0.0570451, 0.0193078, 0.0367281,
    0.0580589, 0.0832518, 0.0244313, 0.048466, 0.086209, 0.0620286,
    0.0195027, 0.0384319, 0.0457631, 0.0695179, 0.0610127, 0.0143859,
    0.0352742, 0.0708956,
];

static BLOSUM62_FREQS: [f64; AA_STATES] = [
    0.074, 0.052, 0.045, 0.054, 0.025, 0.034,
    0.054, 0.074, 0.026, 0.068, 0.099, 0.058,
    0.025, 0.047, 0.039, 0.057, 0.051, 0.013,
    0.032, 0.073,
];

/// Expand PAML lower-triangle values into a full symmetric matrix.
fn lower_triangle_to_matrix(values: &[f64]) -> Vec<Vec<f64>> {
    let mut s = vec![vec![0.0; AA_STATES]; AA_STATES];
    let mut idx = 0;
    for i in 1..AA_STATES {
        for j in 0..i {
            s[i][j] = values[idx];
            s[j][i] = values[idx];
            idx += 1;
        }
    }
    s
}

/// The built-in empirical models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProteinModelKind {
    Dayhoff,
    Jtt,
    Wag,
    Blosum62,
}

impl ProteinModelKind {
    /// Frequencies published with the model.
    pub fn default_frequencies(self) -> &'static [f64] {
        match self {
            ProteinModelKind::Dayhoff => &DAYHOFF_FREQS,
            ProteinModelKind::Jtt => &JTT_FREQS,
            ProteinModelKind::Wag => &WAG_FREQS,
            ProteinModelKind::Blosum62 => &BLOSUM62_FREQS,
        }
    }

    /// Symmetric 20x20 exchangeability matrix.
    pub fn exchangeabilities(self) -> Vec<Vec<f64>> {
        match self {
            ProteinModelKind::Dayhoff => lower_triangle_to_matrix(&DAYHOFF_EXCHANGE),
            ProteinModelKind::Jtt => lower_triangle_to_matrix(&JTT_EXCHANGE),
            ProteinModelKind::Wag => lower_triangle_to_matrix(&WAG_EXCHANGE),
            ProteinModelKind::Blosum62 => lower_triangle_to_matrix(&BLOSUM62_EXCHANGE),
        }
    }

    fn description(self) -> &'static str {
        match self {
            ProteinModelKind::Dayhoff => "Dayhoff (Dayhoff, Schwartz & Orcutt 1978)",
            ProteinModelKind::Jtt => "JTT (Jones, Taylor & Thornton 1992)",
            ProteinModelKind::Wag => "WAG / wag.dat (Whelan & Goldman 2001)",
            ProteinModelKind::Blosum62 => "BLOSUM62 (Henikoff & Henikoff 1992)",
        }
    }
}

impl fmt::Display for ProteinModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProteinModelKind::Dayhoff => "dayhoff",
            ProteinModelKind::Jtt => "jtt",
            ProteinModelKind::Wag => "wag",
            ProteinModelKind::Blosum62 => "blosum62",
        };
        f.write_str(name)
    }
}

impl FromStr for ProteinModelKind {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dayhoff" => Ok(ProteinModelKind::Dayhoff),
            "jtt" => Ok(ProteinModelKind::Jtt),
            "wag" | "wag.dat" => Ok(ProteinModelKind::Wag),
            "blosum62" => Ok(ProteinModelKind::Blosum62),
            other => Err(ReconError::Config(format!(
                "unknown substitution model '{}' (expected dayhoff, jtt, wag, wag.dat or blosum62)",
                other
            ))),
        }
    }
}

/// A reversible 20-state model defined by exchangeabilities and frequencies.
#[derive(Debug, Clone)]
pub struct EmpiricalModel {
    name: String,
    freqs: Vec<f64>,
    q: Vec<Vec<f64>>,
    eigen: EigenSystem,
}

impl EmpiricalModel {
    /// Build a model from a symmetric exchangeability matrix and frequencies.
    ///
    /// Frequencies are rescaled to sum to 1.
    pub fn new(name: impl Into<String>, exchangeabilities: Vec<Vec<f64>>, freqs: &[f64]) -> Result<Self> {
        if exchangeabilities.len() != AA_STATES
            || exchangeabilities.iter().any(|row| row.len() != AA_STATES)
        {
            return Err(ReconError::InvalidInput(format!(
                "exchangeability matrix must be {}x{}",
                AA_STATES, AA_STATES
            )));
        }
        for i in 0..AA_STATES {
            for j in 0..i {
                let (a, b) = (exchangeabilities[i][j], exchangeabilities[j][i]);
                if !a.is_finite() || a < 0.0 || a != b {
                    return Err(ReconError::InvalidInput(format!(
                        "exchangeability ({},{}) must be finite, non-negative and symmetric",
                        i, j
                    )));
                }
            }
        }
        if freqs.len() != AA_STATES {
            return Err(ReconError::InvalidInput(format!(
                "expected {} equilibrium frequencies, got {}",
                AA_STATES,
                freqs.len()
            )));
        }

        let freqs = normalize_frequencies(freqs)?;
        let q = build_rate_matrix(&exchangeabilities, &freqs);
        let eigen = EigenSystem::new(&q, &freqs)?;
        Ok(Self {
            name: name.into(),
            freqs,
            q,
            eigen,
        })
    }

    /// One of the built-in models with its published frequencies.
    pub fn builtin(kind: ProteinModelKind) -> Result<Self> {
        Self::new(kind.description(), kind.exchangeabilities(), kind.default_frequencies())
    }

    /// A built-in model with user-supplied equilibrium frequencies.
    ///
    /// Frequencies that do not sum to 1 are normalised with a warning.
    pub fn with_frequencies(kind: ProteinModelKind, freqs: &[f64]) -> Result<Self> {
        let total: f64 = freqs.iter().sum();
        if (total - 1.0).abs() > FREQUENCY_TOLERANCE {
            warn!(
                "supplied frequencies sum to {}; normalising to 1",
                total
            );
        }
        Self::new(
            format!("{}, user frequencies", kind.description()),
            kind.exchangeabilities(),
            freqs,
        )
    }
}

impl SubstitutionModel for EmpiricalModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_states(&self) -> usize {
        AA_STATES
    }

    fn frequencies(&self) -> &[f64] {
        &self.freqs
    }

    fn rate_matrix(&self) -> &[Vec<f64>] {
        &self.q
    }

    fn transition_probs(&self, t: f64) -> Vec<Vec<f64>> {
        self.eigen.transition_probs(t)
    }
}

impl Reportable for EmpiricalModel {
    fn report_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Model of substitution: {}", self.name),
            String::new(),
            "Equilibrium frequencies:".to_string(),
        ];
        for (state, f) in self.freqs.iter().enumerate() {
            let symbol = amino_acid_symbol(state).unwrap_or('?');
            lines.push(format!("  pi({}) = {:.6}", symbol, f));
        }
        lines.push(String::new());
        lines
    }
}

/// Parse a custom amino acid model from PAML-format text.
///
/// The first 190 numbers are the lower-triangle exchangeabilities, the next
/// 20 the equilibrium frequencies. Anything after that is ignored, which
/// allows the trailing notes PAML model files usually carry.
pub fn load_aa_model(name: &str, text: &str) -> Result<EmpiricalModel> {
    let mut values = Vec::with_capacity(N_EXCHANGE + AA_STATES);
    for token in text.split_whitespace() {
        if values.len() == N_EXCHANGE + AA_STATES {
            break;
        }
        let v: f64 = token.parse().map_err(|_| {
            ReconError::Parse(format!(
                "{}: invalid number '{}' after {} values",
                name,
                token,
                values.len()
            ))
        })?;
        values.push(v);
    }
    if values.len() < N_EXCHANGE + AA_STATES {
        return Err(ReconError::Parse(format!(
            "{}: expected {} exchangeabilities and {} frequencies, found {} values",
            name,
            N_EXCHANGE,
            AA_STATES,
            values.len()
        )));
    }

    let (exchange, freqs) = values.split_at(N_EXCHANGE);
    EmpiricalModel::new(
        format!("custom ({})", name),
        lower_triangle_to_matrix(exchange),
        freqs,
    )
}

/// Read a PAML-format model file.
pub fn load_aa_model_path(path: impl AsRef<Path>) -> Result<EmpiricalModel> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    load_aa_model(&path.display().to_string(), &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::AA_ORDER;

    const KINDS: [ProteinModelKind; 4] = [
        ProteinModelKind::Dayhoff,
        ProteinModelKind::Jtt,
        ProteinModelKind::Wag,
        ProteinModelKind::Blosum62,
    ];

    #[test]
    fn published_frequencies_sum_to_one() {
        for kind in KINDS {
            let sum: f64 = kind.default_frequencies().iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "{} sums to {}", kind, sum);
            let model = EmpiricalModel::builtin(kind).unwrap();
            let sum: f64 = model.frequencies().iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn blosum62_table_layout() {
        let s = ProteinModelKind::Blosum62.exchangeabilities();
        let idx = |c: u8| AA_ORDER.iter().position(|&a| a == c).unwrap();
        assert!((s[idx(b'Y')][idx(b'V')] - 1.0).abs() < 1e-12);
        assert!((s[idx(b'W')][idx(b'Y')] - 4.054419).abs() < 1e-6);
        assert!((s[idx(b'R')][idx(b'A')] - 0.735790).abs() < 1e-6);
        // I<->V is the fastest exchange in BLOSUM62.
        let (mut best, mut at) = (0.0, (0, 0));
        for i in 0..AA_STATES {
            for j in 0..i {
                assert_eq!(s[i][j], s[j][i]);
                if s[i][j] > best {
                    best = s[i][j];
                    at = (i, j);
                }
            }
        }
        assert_eq!(at, (idx(b'V'), idx(b'I')));
        let freqs = ProteinModelKind::Blosum62.default_frequencies();
        assert!((freqs[idx(b'L')] - 0.099).abs() < 1e-12);
    }

    #[test]
    fn rate_matrix_rows_sum_to_zero() {
        for kind in KINDS {
            let model = EmpiricalModel::builtin(kind).unwrap();
            for (i, row) in model.rate_matrix().iter().enumerate() {
                let sum: f64 = row.iter().sum();
                assert!(sum.abs() < 1e-10, "{} row {} sums to {}", kind, i, sum);
            }
        }
    }

    #[test]
    fn p_zero_is_identity() {
        for kind in KINDS {
            let p = EmpiricalModel::builtin(kind).unwrap().transition_probs(0.0);
            for i in 0..AA_STATES {
                for j in 0..AA_STATES {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((p[i][j] - expected).abs() < 1e-10, "{} P(0)[{}][{}]", kind, i, j);
                }
            }
        }
    }

    #[test]
    fn p_rows_sum_to_one() {
        for kind in KINDS {
            let model = EmpiricalModel::builtin(kind).unwrap();
            for &t in &[0.01, 0.1, 0.5, 2.0] {
                for (i, row) in model.transition_probs(t).iter().enumerate() {
                    let sum: f64 = row.iter().sum();
                    assert!((sum - 1.0).abs() < 1e-9, "{} row {} t={} sum={}", kind, i, t, sum);
                }
            }
        }
    }

    #[test]
    fn short_branches_favour_identity() {
        let model = EmpiricalModel::builtin(ProteinModelKind::Dayhoff).unwrap();
        let p = model.transition_probs(0.01);
        for i in 0..AA_STATES {
            assert!(p[i][i] > 0.95, "P[{}][{}] = {}", i, i, p[i][i]);
        }
    }

    #[test]
    fn expected_rate_is_one() {
        for kind in KINDS {
            let model = EmpiricalModel::builtin(kind).unwrap();
            let q = model.rate_matrix();
            let mu: f64 = (0..AA_STATES)
                .map(|i| -model.frequencies()[i] * q[i][i])
                .sum();
            assert!((mu - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn models_differ() {
        let wag = EmpiricalModel::builtin(ProteinModelKind::Wag).unwrap();
        let jtt = EmpiricalModel::builtin(ProteinModelKind::Jtt).unwrap();
        let (pw, pj) = (wag.transition_probs(0.3), jtt.transition_probs(0.3));
        let diff: f64 = (0..AA_STATES)
            .flat_map(|i| (0..AA_STATES).map(move |j| (i, j)))
            .map(|(i, j)| (pw[i][j] - pj[i][j]).abs())
            .sum();
        assert!(diff > 0.01);
    }

    #[test]
    fn parse_model_names() {
        assert_eq!("dayhoff".parse::<ProteinModelKind>().unwrap(), ProteinModelKind::Dayhoff);
        assert_eq!("JTT".parse::<ProteinModelKind>().unwrap(), ProteinModelKind::Jtt);
        assert_eq!("wag".parse::<ProteinModelKind>().unwrap(), ProteinModelKind::Wag);
        assert_eq!("wag.dat".parse::<ProteinModelKind>().unwrap(), ProteinModelKind::Wag);
        assert_eq!("BLOSUM62".parse::<ProteinModelKind>().unwrap(), ProteinModelKind::Blosum62);
        assert_eq!(ProteinModelKind::Blosum62.to_string(), "blosum62");
        let wag = EmpiricalModel::builtin(ProteinModelKind::Wag).unwrap();
        assert!(wag.name().contains("wag.dat"));
        assert!(matches!(
            "lg".parse::<ProteinModelKind>(),
            Err(ReconError::Config(_))
        ));
    }

    #[test]
    fn user_frequencies_are_normalised() {
        let raw = vec![2.0; AA_STATES];
        let model = EmpiricalModel::with_frequencies(ProteinModelKind::Wag, &raw).unwrap();
        for &f in model.frequencies() {
            assert!((f - 0.05).abs() < 1e-15);
        }
        assert!(model.name().contains("user frequencies"));
    }

    #[test]
    fn user_frequencies_wrong_length() {
        assert!(EmpiricalModel::with_frequencies(ProteinModelKind::Jtt, &[0.5, 0.5]).is_err());
    }

    #[test]
    fn asymmetric_exchangeabilities_rejected() {
        let mut s = ProteinModelKind::Wag.exchangeabilities();
        s[3][1] += 1.0;
        assert!(EmpiricalModel::new("bad", s, &WAG_FREQS).is_err());
    }

    fn paml_text(exchange: &[f64], freqs: &[f64]) -> String {
        let mut text = String::new();
        let mut idx = 0;
        for i in 1..AA_STATES {
            let row: Vec<String> = exchange[idx..idx + i].iter().map(|v| v.to_string()).collect();
            text.push_str(&row.join(" "));
            text.push('\n');
            idx += i;
        }
        text.push('\n');
        let f: Vec<String> = freqs.iter().map(|v| v.to_string()).collect();
        text.push_str(&f.join(" "));
        text.push_str("\n\nA R N D C Q E G H I L K M F P S T W Y V\nnotes follow\n");
        text
    }

    #[test]
    fn custom_model_matches_builtin() {
        let custom = load_aa_model("wag.dat", &paml_text(&WAG_EXCHANGE, &WAG_FREQS)).unwrap();
        let builtin = EmpiricalModel::builtin(ProteinModelKind::Wag).unwrap();
        let (pc, pb) = (custom.transition_probs(0.25), builtin.transition_probs(0.25));
        for i in 0..AA_STATES {
            for j in 0..AA_STATES {
                assert!((pc[i][j] - pb[i][j]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn custom_model_too_short() {
        let err = load_aa_model("short", "1.0 2.0 3.0").unwrap_err();
        assert!(matches!(err, ReconError::Parse(_)));
    }

    #[test]
    fn custom_model_bad_token() {
        let mut text = paml_text(&JTT_EXCHANGE, &JTT_FREQS);
        text.insert_str(0, "x ");
        assert!(load_aa_model("bad", &text).is_err());
    }

    #[test]
    fn custom_model_from_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(paml_text(&DAYHOFF_EXCHANGE, &DAYHOFF_FREQS).as_bytes())
            .unwrap();
        file.flush().unwrap();
        let model = load_aa_model_path(file.path()).unwrap();
        assert!(model.name().starts_with("custom"));
    }

    #[test]
    fn report_lists_all_frequencies() {
        let lines = EmpiricalModel::builtin(ProteinModelKind::Dayhoff)
            .unwrap()
            .report_lines();
        assert!(lines[0].starts_with("Model of substitution: Dayhoff"));
        assert_eq!(lines.iter().filter(|l| l.contains("pi(")).count(), AA_STATES);
        assert!(lines.iter().any(|l| l == "  pi(V) = 0.064718"));
    }
}
