//! `random`: one generator per execution, seeded from the OS unless the
//! program calls `random.seed`.

use rand::seq::SliceRandom;
use rand::Rng;
use sha2::{Digest, Sha256};

use super::builtins::{Args, Builtin};
use super::eval::Interpreter;
use super::fault::{ExcKind, Fault};
use super::value::{RangeValue, Value};

pub fn call(interp: &mut Interpreter, builtin: Builtin, mut args: Args) -> Result<Value, Fault> {
    match builtin {
        Builtin::RandomSeed => {
            args.count(0, 1)?;
            let a = args.take(0, "a");
            args.finish()?;
            interp.seed_rng(seed_of(a.as_ref())?);
            Ok(Value::None)
        }
        Builtin::RandomRandom => {
            args.finish()?;
            args.count(0, 0)?;
            Ok(Value::Float(interp.rng().gen::<f64>()))
        }
        Builtin::RandomUniform => {
            args.finish()?;
            args.count(2, 2)?;
            let (a, b) = (number(&args.pos[0])?, number(&args.pos[1])?);
            let t = interp.rng().gen::<f64>();
            Ok(Value::Float(a + (b - a) * t))
        }
        Builtin::RandomRandint => {
            args.finish()?;
            args.count(2, 2)?;
            let a = args.pos[0].expect_int("randint() a")?;
            let b = args.pos[1].expect_int("randint() b")?;
            if a > b {
                return Err(Fault::value_error(format!("empty range in randint({}, {})", a, b)));
            }
            Ok(Value::Int(interp.rng().gen_range(a..=b)))
        }
        Builtin::RandomRandrange => {
            args.finish()?;
            args.count(1, 3)?;
            let ints = args
                .pos
                .iter()
                .map(|v| v.expect_int("randrange() argument"))
                .collect::<Result<Vec<i64>, Fault>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step, ..] => (*start, *stop, *step),
                [] => (0, 0, 1),
            };
            if step == 0 {
                return Err(Fault::value_error("zero step for randrange()"));
            }
            let range = RangeValue { start, stop, step };
            let len = range.len();
            if len == 0 {
                return Err(Fault::value_error(format!(
                    "empty range for randrange({}, {}, {})",
                    start, stop, step
                )));
            }
            let i = interp.rng().gen_range(0..len);
            Ok(Value::Int(range.get(i)))
        }
        Builtin::RandomChoice => {
            args.finish()?;
            args.count(1, 1)?;
            let items = interp.collect(&args.pos[0])?;
            if items.is_empty() {
                return Err(empty_population());
            }
            let i = interp.rng().gen_range(0..items.len());
            Ok(items[i].clone())
        }
        Builtin::RandomChoices => choices(interp, args),
        Builtin::RandomShuffle => {
            args.finish()?;
            args.count(1, 1)?;
            let Value::List(list) = &args.pos[0] else {
                return Err(Fault::type_error(format!(
                    "shuffle() argument must be a list, not {}",
                    args.pos[0].type_name()
                )));
            };
            list.borrow_mut().shuffle(interp.rng());
            Ok(Value::None)
        }
        Builtin::RandomSample => {
            args.count(1, 2)?;
            let k = args.take(1, "k");
            args.finish()?;
            let k = match k {
                Some(k) => k.expect_int("sample() k")?,
                None => return Err(Fault::type_error("sample() missing required argument 'k'")),
            };
            let items = interp.collect(&args.pos[0])?;
            let k = usize::try_from(k)
                .ok()
                .filter(|k| *k <= items.len())
                .ok_or_else(|| Fault::value_error("Sample larger than population or is negative"))?;
            let picked = rand::seq::index::sample(interp.rng(), items.len(), k);
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        other => Err(Fault::type_error(format!("{}() is not callable here", other.name()))),
    }
}

/// `random.seed(a)`: `None` reseeds from the OS; ints, floats and strings
/// give a reproducible sequence.
fn seed_of(a: Option<&Value>) -> Result<Option<u64>, Fault> {
    Ok(match a {
        None | Some(Value::None) => None,
        Some(Value::Int(i)) => Some(*i as u64),
        Some(Value::Bool(b)) => Some(*b as u64),
        Some(Value::Float(f)) => Some(f.to_bits()),
        Some(Value::Str(s)) => {
            let digest = Sha256::digest(s.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            Some(u64::from_le_bytes(bytes))
        }
        Some(other) => {
            return Err(Fault::type_error(format!(
                "The only supported seed types are: None, int, float, str, not {}",
                other.type_name()
            )))
        }
    })
}

/// `random.choices(population, weights=None, *, k=1)`
fn choices(interp: &mut Interpreter, mut args: Args) -> Result<Value, Fault> {
    args.count(1, 2)?;
    let weights = args.take(1, "weights");
    let k = match args.kwarg("k") {
        Some(k) => k.expect_int("choices() k")?.max(0) as usize,
        None => 1,
    };
    args.finish()?;
    interp.check_len(k)?;
    let items = interp.collect(&args.pos[0])?;
    if items.is_empty() {
        return if k == 0 {
            Ok(Value::list(Vec::new()))
        } else {
            Err(empty_population())
        };
    }
    let cumulative = match weights {
        None | Some(Value::None) => None,
        Some(w) => {
            let w = interp.collect(&w)?;
            if w.len() != items.len() {
                return Err(Fault::value_error(
                    "The number of weights does not match the population",
                ));
            }
            let mut running = 0.0;
            let mut sums = Vec::with_capacity(w.len());
            for weight in &w {
                running += number(weight)?;
                sums.push(running);
            }
            if !running.is_finite() || running <= 0.0 {
                return Err(Fault::value_error("Total of weights must be greater than zero"));
            }
            Some(sums)
        }
    };
    let mut out = Vec::with_capacity(k);
    for _ in 0..k {
        interp.poll()?;
        let i = match &cumulative {
            None => interp.rng().gen_range(0..items.len()),
            Some(sums) => {
                let total = sums[sums.len() - 1];
                let r = interp.rng().gen::<f64>() * total;
                sums.partition_point(|c| *c <= r).min(items.len() - 1)
            }
        };
        out.push(items[i].clone());
    }
    Ok(Value::list(out))
}

fn empty_population() -> Fault {
    Fault::new(ExcKind::IndexError, "Cannot choose from an empty sequence")
}

fn number(v: &Value) -> Result<f64, Fault> {
    v.as_f64().ok_or_else(|| {
        Fault::type_error(format!("must be real number, not {}", v.type_name()))
    })
}
