use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RatExp {
    num: i32,
    den: i32,
}

impl RatExp {
    pub const fn zero() -> Self {
        Self { num: 0, den: 1 }
    }

    pub const fn from_i32(value: i32) -> Self {
        Self { num: value, den: 1 }
    }

    pub const fn new(num: i32, den: i32) -> Self {
        assert!(den != 0, "dimension exponent denominator must be non-zero");
        if num == 0 {
            return Self::zero();
        }

        let (mut num, mut den) = (num, den);
        if den < 0 {
            num = -num;
            den = -den;
        }

        let gcd = gcd_i32(abs_i32(num), den);
        Self {
            num: num / gcd,
            den: den / gcd,
        }
    }

    pub const fn is_zero(self) -> bool {
        self.num == 0
    }

    pub const fn add_exp(self, rhs: Self) -> Self {
        if self.num == 0 {
            return rhs;
        }
        if rhs.num == 0 {
            return self;
        }

        let num = (self.num as i64) * (rhs.den as i64) + (rhs.num as i64) * (self.den as i64);
        let den = (self.den as i64) * (rhs.den as i64);
        Self::new(i64_to_i32_checked(num), i64_to_i32_checked(den))
    }

    pub const fn sub_exp(self, rhs: Self) -> Self {
        if rhs.num == 0 {
            return self;
        }
        let num = (self.num as i64) * (rhs.den as i64) - (rhs.num as i64) * (self.den as i64);
        let den = (self.den as i64) * (rhs.den as i64);
        Self::new(i64_to_i32_checked(num), i64_to_i32_checked(den))
    }

    pub const fn mul_exp(self, rhs: Self) -> Self {
        if self.num == 0 || rhs.num == 0 {
            return Self::zero();
        }
        let num = (self.num as i64) * (rhs.num as i64);
        let den = (self.den as i64) * (rhs.den as i64);
        Self::new(i64_to_i32_checked(num), i64_to_i32_checked(den))
    }
}

impl fmt::Display for RatExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

const fn i64_to_i32_checked(value: i64) -> i32 {
    if value < i32::MIN as i64 || value > i32::MAX as i64 {
        panic!("dimension exponent overflow");
    }
    value as i32
}

const fn abs_i32(value: i32) -> i32 {
    if value < 0 {
        -value
    } else {
        value
    }
}

const fn gcd_i32(mut a: i32, mut b: i32) -> i32 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    let a = abs_i32(a);
    if a == 0 {
        1
    } else {
        a
    }
}

/// Physical dimension exponents in **SI base units** with rational powers.
///
/// - `kg` = mass (kilogram)
/// - `m` = length (meter)
/// - `s` = time (second)
/// - `mol` = amount of substance (mole)
/// - `K` = thermodynamic temperature (kelvin)
///
/// This encodes **dimensions only** (no scale factors). Every derived
/// expression node declares a `Dim`; multiplication adds exponents, division
/// subtracts them, and additive composition is only legal at identical `Dim`
/// (enforced by the expression layer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dim {
    m: RatExp,
    l: RatExp,
    t: RatExp,
    n: RatExp,
    temp: RatExp,
}

impl Dim {
    pub const fn new(m: i8, l: i8, t: i8) -> Self {
        Self {
            m: RatExp::from_i32(m as i32),
            l: RatExp::from_i32(l as i32),
            t: RatExp::from_i32(t as i32),
            n: RatExp::zero(),
            temp: RatExp::zero(),
        }
    }

    pub const fn new_full(m: i8, l: i8, t: i8, n: i8, temp: i8) -> Self {
        Self {
            m: RatExp::from_i32(m as i32),
            l: RatExp::from_i32(l as i32),
            t: RatExp::from_i32(t as i32),
            n: RatExp::from_i32(n as i32),
            temp: RatExp::from_i32(temp as i32),
        }
    }

    pub const fn dimensionless() -> Self {
        Self {
            m: RatExp::zero(),
            l: RatExp::zero(),
            t: RatExp::zero(),
            n: RatExp::zero(),
            temp: RatExp::zero(),
        }
    }

    pub fn is_dimensionless(self) -> bool {
        self == Self::dimensionless()
    }

    pub const fn mul_dim(self, rhs: Self) -> Self {
        Self {
            m: self.m.add_exp(rhs.m),
            l: self.l.add_exp(rhs.l),
            t: self.t.add_exp(rhs.t),
            n: self.n.add_exp(rhs.n),
            temp: self.temp.add_exp(rhs.temp),
        }
    }

    pub const fn div_dim(self, rhs: Self) -> Self {
        Self {
            m: self.m.sub_exp(rhs.m),
            l: self.l.sub_exp(rhs.l),
            t: self.t.sub_exp(rhs.t),
            n: self.n.sub_exp(rhs.n),
            temp: self.temp.sub_exp(rhs.temp),
        }
    }

    pub const fn pow_ratio(self, num: i32, den: i32) -> Self {
        let exp = RatExp::new(num, den);
        Self {
            m: self.m.mul_exp(exp),
            l: self.l.mul_exp(exp),
            t: self.t.mul_exp(exp),
            n: self.n.mul_exp(exp),
            temp: self.temp.mul_exp(exp),
        }
    }

    pub const fn powi(self, exp: i32) -> Self {
        self.pow_ratio(exp, 1)
    }

    pub const fn sqrt(self) -> Self {
        self.pow_ratio(1, 2)
    }
}

impl Default for Dim {
    fn default() -> Self {
        Self::dimensionless()
    }
}

impl std::ops::Mul for Dim {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.mul_dim(rhs)
    }
}

impl std::ops::Div for Dim {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        self.div_dim(rhs)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Dim::dimensionless() {
            return write!(f, "1");
        }

        let mut parts = Vec::new();
        push_dim(&mut parts, "kg", self.m);
        push_dim(&mut parts, "m", self.l);
        push_dim(&mut parts, "s", self.t);
        push_dim(&mut parts, "mol", self.n);
        push_dim(&mut parts, "K", self.temp);
        write!(f, "{}", parts.join(" "))
    }
}

fn push_dim(parts: &mut Vec<String>, name: &str, exp: RatExp) {
    if exp.is_zero() {
        return;
    }
    if exp.den == 1 && exp.num == 1 {
        parts.push(name.to_string());
    } else if exp.den == 1 {
        parts.push(format!("{name}^{}", exp.num));
    } else {
        parts.push(format!("{name}^({exp})"));
    }
}

pub mod si {
    use super::Dim;

    pub const DIMENSIONLESS: Dim = Dim::dimensionless();

    pub const MASS: Dim = Dim::new(1, 0, 0);
    pub const LENGTH: Dim = Dim::new(0, 1, 0);
    pub const TIME: Dim = Dim::new(0, 0, 1);
    pub const MOLE: Dim = Dim::new_full(0, 0, 0, 1, 0);
    pub const TEMPERATURE: Dim = Dim::new_full(0, 0, 0, 0, 1);

    pub const AREA: Dim = LENGTH.powi(2);
    pub const VOLUME: Dim = AREA.mul_dim(LENGTH);

    pub const INV_TIME: Dim = TIME.powi(-1);

    pub const DENSITY: Dim = MASS.div_dim(VOLUME);
    pub const VELOCITY: Dim = LENGTH.div_dim(TIME);

    pub const FORCE: Dim = MASS.mul_dim(LENGTH).div_dim(TIME.powi(2)); // N = kg·m/s^2
    pub const PRESSURE: Dim = FORCE.div_dim(AREA);
    pub const DYNAMIC_VISCOSITY: Dim = PRESSURE.mul_dim(TIME);

    pub const DIFFUSIVITY: Dim = AREA.div_dim(TIME); // m^2/s
    pub const VOLUME_FLOW: Dim = VOLUME.div_dim(TIME); // m^3/s
    pub const MASS_FLOW: Dim = MASS.div_dim(TIME); // kg/s

    pub const MOLALITY: Dim = MOLE.div_dim(MASS); // mol/kg solvent
    pub const MOLAR_MASS: Dim = MASS.div_dim(MOLE); // kg/mol

    /// Volumetric event rate carried by reaction rates and their
    /// concentration derivatives.
    pub const REACTIVITY: Dim = VOLUME.powi(-1).mul_dim(INV_TIME); // m^-3 s^-1
}
