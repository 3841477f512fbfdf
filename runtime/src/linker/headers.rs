//! Creates the values of the variables once their types are known.
use log::debug;
use stint_dsl::diagnostic::Diagnostic;

use crate::memory::VarId;

use super::Linker;

impl Linker {
    /// Creates the current value and the initial value of every global
    /// variable and every variable of a function or program. Variables
    /// that already have a value are unchanged, so finalizing again after
    /// adding a library only creates the new variables.
    pub fn finalize_header(&mut self) -> Result<(), Vec<Diagnostic>> {
        let ids: Vec<VarId> = self.machine.memory.ids().collect();
        let mut created = 0;
        let mut errors = vec![];
        for var in ids {
            match self.finalize_variable(var) {
                Ok(true) => created += 1,
                Ok(false) => {}
                Err(err) => errors.push(err),
            }
        }

        debug!("Finalized header with {} new variables", created);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns true if the variable was created.
    fn finalize_variable(&mut self, var: VarId) -> Result<bool, Diagnostic> {
        let variable = self
            .machine
            .memory
            .get(var)
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
        if variable.value.is_some() {
            return Ok(false);
        }
        let name = variable.name.clone();
        let data_type = variable
            .data_type
            .clone()
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;

        let initial = match self.initials.get(&var) {
            Some(constant) => Some(
                self.table
                    .initial_value(constant, &data_type)
                    .map_err(|err| err.with_context_id("variable", &name))?,
            ),
            None => None,
        };
        let value = match &initial {
            Some(initial) => initial.clone(),
            None => data_type.create_value(),
        };

        let variable = self
            .machine
            .memory
            .get_mut(var)
            .ok_or_else(|| Diagnostic::internal_error(file!(), line!()))?;
        variable.initial = initial;
        variable.value = Some(value);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use stint_dsl::common::{ConstantKind, DataTypeDeclaration, Library, VarDecl};
    use stint_dsl::core::Id;
    use stint_problems::Problem;

    use crate::config::RuntimeConfig;
    use crate::linker::Linker;

    fn resolved(library: Library) -> Linker {
        let mut linker = Linker::new(RuntimeConfig::default());
        linker.add_library(library).unwrap();
        linker.resolve_types().unwrap();
        linker
    }

    fn global_text(linker: &Linker, name: &str) -> String {
        let var = linker.global(&Id::from(name)).unwrap();
        linker.machine().memory.value(var).unwrap().to_string()
    }

    #[test]
    fn finalize_header_when_initial_value_then_value_is_initial() {
        let library = Library::new().with_globals(vec![
            VarDecl::simple("Level", "INT").with_initial(ConstantKind::integer(7))
        ]);
        let mut linker = resolved(library);

        linker.finalize_header().unwrap();

        let var = linker.global(&Id::from("Level")).unwrap();
        let memory = &linker.machine().memory;
        assert_eq!(Some(7), memory.value(var).unwrap().as_integer());
    }

    #[test]
    fn finalize_header_when_bare_enumerated_initial_then_value_of_variable_type() {
        let library = Library::new()
            .with_type(DataTypeDeclaration::enumeration("Color", vec!["Red", "Green"]))
            .with_globals(vec![
                VarDecl::simple("Light", "Color").with_initial(ConstantKind::enumerated("Green"))
            ]);
        let mut linker = resolved(library);

        linker.finalize_header().unwrap();

        assert_eq!("Color#Green", global_text(&linker, "Light"));
    }

    #[test]
    fn finalize_header_when_initial_out_of_range_then_initial_value_invalid() {
        let library = Library::new().with_globals(vec![
            VarDecl::simple("Level", "SINT").with_initial(ConstantKind::integer(300))
        ]);
        let mut linker = resolved(library);

        let errors = linker.finalize_header().unwrap_err();

        assert_eq!(Problem::InitialValueInvalid.code(), errors[0].code);
    }

    #[test]
    fn finalize_header_when_called_twice_then_value_kept() {
        let library = Library::new().with_globals(vec![VarDecl::simple("Level", "INT")]);
        let mut linker = resolved(library);
        linker.finalize_header().unwrap();
        let var = linker.global(&Id::from("Level")).unwrap();
        linker
            .machine
            .memory
            .value_mut(var)
            .unwrap()
            .assign(&crate::datatypes::IntegerValue::literal(3).unwrap())
            .unwrap();

        linker.finalize_header().unwrap();

        assert_eq!(
            Some(3),
            linker.machine().memory.value(var).unwrap().as_integer()
        );
    }
}
