//! CPLEX-LP rendering of a [`Program`].

use std::fmt::{self, Write};

use itertools::Itertools;

use crate::constraint::Relation;
use crate::expression::Expression;
use crate::program::{Program, Sense};
use crate::variable::{Domain, VarId};

struct TermWriter<'a> {
    program: &'a Program,
    out: String,
}

impl<'a> TermWriter<'a> {
    const fn new(program: &'a Program) -> Self {
        Self {
            program,
            out: String::new(),
        }
    }

    fn name(&self, var: VarId) -> &str {
        self.program.variable(var).map_or("?", |v| v.name())
    }

    fn push(&mut self, coefficient: f64, body: &str) {
        let sign = if coefficient < 0.0 { '-' } else { '+' };
        let magnitude = coefficient.abs();
        if self.out.is_empty() || self.out.ends_with("[ ") {
            if coefficient < 0.0 {
                self.out.push_str("- ");
            }
        } else {
            let _ = write!(self.out, " {sign} ");
        }
        let _ = write!(self.out, "{magnitude} {body}");
    }

    /// Linear terms, then products in brackets; `halve` doubles product
    /// coefficients and appends `/ 2` as the objective section expects.
    fn expression(mut self, expr: &Expression, with_constant: bool, halve: bool) -> String {
        for (var, c) in expr.linear().terms() {
            let name = self.name(var).to_string();
            self.push(c, &name);
        }
        let products = expr.products().collect_vec();
        if !products.is_empty() {
            if self.out.is_empty() {
                self.out.push_str("[ ");
            } else {
                self.out.push_str(" + [ ");
            }
            for (a, b, c) in products {
                let body = if a == b {
                    format!("{} ^ 2", self.name(a))
                } else {
                    format!("{} * {}", self.name(a), self.name(b))
                };
                self.push(if halve { 2.0 * c } else { c }, &body);
            }
            self.out.push_str(if halve { " ] / 2" } else { " ]" });
        }
        let constant = expr.linear().constant();
        if with_constant && constant != 0.0 {
            let sign = if constant < 0.0 { '-' } else { '+' };
            if self.out.is_empty() {
                let _ = write!(self.out, "{constant}");
            } else {
                let _ = write!(self.out, " {sign} {}", constant.abs());
            }
        }
        if self.out.is_empty() {
            self.out.push('0');
        }
        self.out
    }
}

fn bound(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}",
            match self.sense() {
                Sense::Minimize => "Minimize",
                Sense::Maximize => "Maximize",
            }
        )?;
        writeln!(
            f,
            " obj: {}",
            TermWriter::new(self).expression(self.objective(), true, true)
        )?;

        writeln!(f, "Subject To")?;
        for (index, constraint) in self.constraints().iter().enumerate() {
            let relation = match constraint.relation() {
                Relation::LessEq => "<=",
                Relation::Equal => "=",
                Relation::GreaterEq => ">=",
            };
            let name = constraint
                .name()
                .map_or_else(|| format!("c{index}"), str::to_string);
            writeln!(
                f,
                " {name}: {} {relation} {}",
                TermWriter::new(self).expression(constraint.expression(), false, false),
                constraint.rhs()
            )?;
        }

        writeln!(f, "Bounds")?;
        for var in self.variables() {
            if var.domain() == Domain::Binary && var.lower() == 0.0 && var.upper() == 1.0 {
                continue;
            }
            if var.lower() == var.upper() {
                writeln!(f, " {} = {}", var.name(), var.lower())?;
            } else if var.lower() == f64::NEG_INFINITY && var.upper() == f64::INFINITY {
                writeln!(f, " {} free", var.name())?;
            } else {
                writeln!(f, " {} <= {} <= {}", bound(var.lower()), var.name(), bound(var.upper()))?;
            }
        }

        let of_domain = |domain: Domain| {
            self.variables()
                .iter()
                .filter(move |v| v.domain() == domain)
                .map(|v| v.name())
                .join(" ")
        };
        let binaries = of_domain(Domain::Binary);
        if !binaries.is_empty() {
            writeln!(f, "Binaries\n {binaries}")?;
        }
        let generals = of_domain(Domain::Integer);
        if !generals.is_empty() {
            writeln!(f, "Generals\n {generals}")?;
        }
        writeln!(f, "End")
    }
}
