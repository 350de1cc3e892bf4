mod type_tests;
