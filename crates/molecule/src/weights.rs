/// masses of the most abundant isotope of each element in amu, indexed by
/// atomic number
pub(crate) const WEIGHTS: [f64; 37] = [
    0.0,
    1.00782503207,
    4.00260325415,
    7.016004548,
    9.012182201,
    11.009305406,
    12.0,
    14.00307400478,
    15.99491461956,
    18.998403224,
    19.99244017542,
    22.98976928087,
    23.985041699,
    26.981538627,
    27.97692653246,
    30.973761629,
    31.972070999,
    34.968852682,
    39.96238312251,
    38.963706679,
    39.962590983,
    44.955911909,
    47.947946281,
    50.943959507,
    51.940507472,
    54.938045141,
    55.934937475,
    58.933195048,
    57.935342907,
    62.929597474,
    63.929142222,
    68.925573587,
    73.921177767,
    74.921596478,
    79.916521271,
    78.918337087,
    83.911506687,
];

/// single-bond covalent radii in Å from Cordero et al. (2008)
pub(crate) const COVALENT_RADII: [f64; 37] = [
    0.0, 0.31, 0.28, 1.28, 0.96, 0.84, 0.76, 0.71, 0.66, 0.57, 0.58, 1.66,
    1.41, 1.21, 1.11, 1.07, 1.05, 1.02, 1.06, 2.03, 1.76, 1.70, 1.60, 1.53,
    1.39, 1.39, 1.32, 1.26, 1.24, 1.32, 1.22, 1.22, 1.20, 1.19, 1.20, 1.20,
    1.16,
];
