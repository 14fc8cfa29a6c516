//! Functions model files can refer to by name.

use rand::Rng;
use simbatch_ops::{FnOperation, Registry, Value, Wants};

/// Registry with the built-in functions.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(uniform()).register(add());
    registry
}

/// `uniform(low, high)`: one draw per batch item.
fn uniform() -> FnOperation {
    FnOperation::new("uniform", Wants::RANDOM_STATE, |args, call| {
        let (low, high) = (arg(args, 0)?.as_float()?, arg(args, 1)?.as_float()?);
        if (low..high).is_empty() {
            return Err(simbatch_ops::Error::operation(format!(
                "uniform needs low < high, got {low} and {high}"
            )));
        }
        let n = call.batch_size;
        let rng = call.random_state()?;
        Ok((0..n).map(|_| Value::Float(rng.gen_range(low..high))).collect())
    })
}

/// `add(a, b)`: sum of two scalars.
fn add() -> FnOperation {
    FnOperation::new("add", Wants::NONE, |args, _| {
        match (arg(args, 0)?, arg(args, 1)?) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (a, b) => Ok(Value::Float(a.as_float()? + b.as_float()?)),
        }
    })
}

fn arg(args: &[Value], position: usize) -> simbatch_ops::Result<&Value> {
    args.get(position)
        .ok_or(simbatch_ops::Error::MissingArgument {
            position,
            provided: args.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbatch_ops::{vectorize, Call, OperationSpec, Operation};
    use simbatch_random::RandomStream;

    #[test]
    fn uniform_draws_one_value_per_item() {
        let registry = registry();
        let op = registry
            .build(&OperationSpec::Function {
                name: "uniform".to_string(),
            })
            .unwrap();
        let mut stream = RandomStream::from_seed(1);
        let out = op
            .call(
                &[Value::Float(2.0), Value::Float(3.0)],
                &mut Call::new(4).with_random_state(&mut stream),
            )
            .unwrap();
        let items = out.as_list().unwrap();
        assert_eq!(items.len(), 4);
        assert!(items
            .iter()
            .all(|v| (2.0..3.0).contains(&v.as_float().unwrap())));
    }

    #[test]
    fn uniform_rejects_empty_interval() {
        let mut stream = RandomStream::from_seed(1);
        assert!(uniform()
            .call(
                &[Value::Float(1.0), Value::Float(1.0)],
                &mut Call::new(1).with_random_state(&mut stream),
            )
            .is_err());
    }

    #[test]
    fn add_broadcasts_under_vectorize() {
        let op = vectorize(add());
        let out = op
            .call(
                &[Value::from(vec![1, 2, 3]), Value::Int(10)],
                &mut Call::new(3),
            )
            .unwrap();
        assert_eq!(out, Value::from(vec![11, 12, 13]));
    }

    #[test]
    fn add_reports_missing_argument() {
        assert!(matches!(
            add().call(&[Value::Int(1)], &mut Call::new(1)),
            Err(simbatch_ops::Error::MissingArgument { position: 1, .. })
        ));
    }
}
